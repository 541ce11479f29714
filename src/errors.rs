use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Failure classes a geocoding provider call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The call exceeded the adapter's timeout
    Timeout,
    /// Non-2xx status, undecodable payload, or no usable address in the payload
    BadResponse,
    /// Connection, DNS or transport failure
    Unreachable,
}

/// Normalized error returned by every [`crate::providers::GeocodingProvider`].
///
/// Never crosses the resolver or autocomplete boundary; both recover locally.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{provider} {kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub provider: String,
    pub message: String,
    /// Upstream HTTP status, when the provider answered with one.
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// True when the failure says the provider itself is unhealthy: no
    /// connection, no answer in time, or a 5xx/429 status. A well-formed
    /// answer without a usable address is not an outage.
    pub fn is_outage(&self) -> bool {
        match self.kind {
            ProviderErrorKind::Timeout | ProviderErrorKind::Unreachable => true,
            ProviderErrorKind::BadResponse => {
                matches!(self.status, Some(status) if status >= 500 || status == 429)
            }
        }
    }

    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, provider, message)
    }

    pub fn bad_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::BadResponse, provider, message)
    }

    pub fn unreachable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unreachable, provider, message)
    }

    /// Maps a reqwest failure onto the provider taxonomy.
    pub fn from_reqwest(provider: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(provider, err.to_string())
        } else if err.is_decode() || err.is_status() || err.is_body() {
            let error = Self::bad_response(provider, err.to_string());
            match err.status() {
                Some(status) => error.with_status(status.as_u16()),
                None => error,
            }
        } else {
            Self::unreachable(provider, err.to_string())
        }
    }
}

/// Errors reported by the device location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GpsError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location unavailable")]
    Unavailable,
    #[error("location request timed out")]
    Timeout,
}

impl GpsError {
    /// User-facing guidance shown next to the pickup field.
    pub fn guidance(&self) -> &'static str {
        match self {
            GpsError::PermissionDenied => {
                "Location access was denied. Allow location access in your browser settings, or click the map to choose a pickup point."
            }
            GpsError::Unavailable => {
                "Your position could not be determined. Check that location services are enabled, or type the pickup address."
            }
            GpsError::Timeout => {
                "Finding your position took too long. Try again, or click the map to choose a pickup point."
            }
        }
    }
}

/// Construction-time errors. Resolution and search never return these.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid coordinate: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("Search query is empty")]
    EmptyQuery,

    #[error("Invalid service area: {0}")]
    InvalidServiceArea(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display_names_provider_and_kind() {
        let err = ProviderError::timeout("nominatim", "no answer after 10s");
        assert_eq!(err.to_string(), "nominatim timeout: no answer after 10s");
        assert_eq!(err.kind, ProviderErrorKind::Timeout);
    }

    #[test]
    fn only_unhealthy_providers_count_as_outages() {
        assert!(ProviderError::timeout("nominatim", "slow").is_outage());
        assert!(ProviderError::unreachable("nominatim", "refused").is_outage());
        assert!(ProviderError::bad_response("nominatim", "busy").with_status(503).is_outage());
        assert!(ProviderError::bad_response("nominatim", "slow down").with_status(429).is_outage());

        assert!(!ProviderError::bad_response("nominatim", "Unable to geocode").is_outage());
        assert!(!ProviderError::bad_response("nominatim", "not found").with_status(404).is_outage());
    }

    #[test]
    fn gps_guidance_is_actionable() {
        for err in [GpsError::PermissionDenied, GpsError::Unavailable, GpsError::Timeout] {
            let text = err.guidance();
            assert!(text.ends_with('.'));
            assert!(text.contains("pickup"));
        }
    }

    #[test]
    fn provider_error_kind_serializes_screaming() {
        let json = serde_json::to_string(&ProviderErrorKind::BadResponse).unwrap();
        assert_eq!(json, "\"BAD_RESPONSE\"");
    }
}
