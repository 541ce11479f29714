//! Geocoding provider adapters.
//!
//! Every adapter translates one upstream API into the [`GeocodingProvider`]
//! call shape and normalizes failures into [`ProviderError`]. Adapters do not
//! retry and hold no mutable state; ordering and fallback live in
//! [`crate::resolver`].

pub mod nominatim;
pub mod photon;
pub mod scripted;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{GeocodingConfig, ProviderConfig, ProviderKind, ProviderRole};
use crate::errors::{EngineError, ProviderError};
use crate::models::{Coordinate, SearchRequest, Suggestion};

pub use nominatim::NominatimProvider;
pub use photon::PhotonProvider;
pub use scripted::{ProviderCall, ScriptedProvider};

/// Uniform call shape over one reverse/forward geocoding service.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Stable identifier used in logs, metrics and circuit breaker keys.
    fn name(&self) -> &'static str;

    /// Coordinate to a single-line street address.
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<String, ProviderError>;

    /// Text query to candidate locations, bounded by `request.area` when set.
    async fn forward_search(&self, request: SearchRequest) -> Result<Vec<Suggestion>, ProviderError>;
}

/// HTTP settings shared by the adapters.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept_language: String,
}

impl HttpSettings {
    pub fn for_provider(provider: &ProviderConfig, geocoding: &GeocodingConfig) -> Self {
        Self {
            timeout: provider.timeout(),
            user_agent: geocoding.user_agent.clone(),
            accept_language: geocoding.accept_language.clone(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("ride-locator/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_language: "sv,en".to_string(),
        }
    }
}

/// Builds the adapter a provider entry describes.
pub fn build_provider(
    provider: &ProviderConfig,
    geocoding: &GeocodingConfig,
) -> Result<Arc<dyn GeocodingProvider>, EngineError> {
    let settings = HttpSettings::for_provider(provider, geocoding);
    Ok(match provider.kind {
        ProviderKind::Nominatim => Arc::new(NominatimProvider::new(&provider.base_url, &settings)?),
        ProviderKind::Photon => Arc::new(PhotonProvider::new(&provider.base_url, &settings)?),
    })
}

/// The adapters built from `[geocoding]`, shared by the resolver and autocomplete.
#[derive(Clone)]
pub struct ConfiguredProviders {
    pub primary: Arc<dyn GeocodingProvider>,
    pub backup: Option<Arc<dyn GeocodingProvider>>,
}

impl ConfiguredProviders {
    pub fn from_config(geocoding: &GeocodingConfig) -> Result<Self, EngineError> {
        let primary = build_provider(&geocoding.primary, geocoding)?;
        let backup = if geocoding.backup.enabled {
            Some(build_provider(&geocoding.backup, geocoding)?)
        } else {
            None
        };
        Ok(Self { primary, backup })
    }

    /// Priority order for reverse geocoding.
    pub fn ordered(&self) -> Vec<Arc<dyn GeocodingProvider>> {
        std::iter::once(self.primary.clone())
            .chain(self.backup.clone())
            .collect()
    }

    /// Falls back to the primary when the backup is disabled.
    pub fn for_role(&self, role: ProviderRole) -> Arc<dyn GeocodingProvider> {
        match (role, &self.backup) {
            (ProviderRole::Backup, Some(backup)) => backup.clone(),
            _ => self.primary.clone(),
        }
    }
}

/// A client per adapter so each carries its own timeout.
pub(crate) fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, EngineError> {
    let client = reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.as_str())
        .build()?;
    Ok(client)
}

pub(crate) fn parse_base_url(base: &str) -> Result<Url, EngineError> {
    Ok(Url::parse(base)?)
}

/// Appends `segment` to the base path, keeping any path prefix the base carries.
pub(crate) fn endpoint(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(segment);
    }
    url
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    client: &reqwest::Client,
    url: Url,
    accept_language: &str,
) -> Result<T, ProviderError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::ACCEPT_LANGUAGE, accept_language)
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(
            ProviderError::bad_response(provider, format!("{provider} returned status {status}"))
                .with_status(status.as_u16()),
        );
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, &e))?;

    serde_json::from_slice(&body)
        .map_err(|e| ProviderError::bad_response(provider, format!("malformed payload: {e}")))
}

/// `road house_number` when a road is known.
pub(crate) fn street_line(road: Option<&str>, house_number: Option<&str>) -> Option<String> {
    let road = road.map(str::trim).filter(|r| !r.is_empty())?;
    match house_number.map(str::trim).filter(|n| !n.is_empty()) {
        Some(number) => Some(format!("{road} {number}")),
        None => Some(road.to_string()),
    }
}

/// `Stortorget 1, Malmö`, or just the street when the locality is unknown.
pub(crate) fn compose_address(street: Option<String>, locality: Option<&str>) -> Option<String> {
    let street = street?;
    match locality.map(str::trim).filter(|l| !l.is_empty()) {
        Some(locality) => Some(format!("{street}, {locality}")),
        None => Some(street),
    }
}

pub(crate) fn first_segment(display_name: &str) -> String {
    display_name
        .split(',')
        .next()
        .unwrap_or(display_name)
        .trim()
        .to_string()
}
