use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::geo::Coordinate;

/// Prefix that marks a coordinate-only address in the UI.
pub const DEGRADED_GLYPH: &str = "📍";

/// Where a resolved address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressSource {
    ProviderPrimary,
    ProviderBackup,
    CoordinateFallback,
}

impl AddressSource {
    /// Rank 0 is the primary provider; anything after it is a backup.
    pub fn for_rank(rank: usize) -> Self {
        if rank == 0 {
            AddressSource::ProviderPrimary
        } else {
            AddressSource::ProviderBackup
        }
    }
}

/// Result of one resolution request. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub text: String,
    pub source: AddressSource,
    pub coordinate: Coordinate,
}

impl ResolvedAddress {
    pub fn from_provider(text: String, rank: usize, coordinate: Coordinate) -> Self {
        Self {
            text,
            source: AddressSource::for_rank(rank),
            coordinate,
        }
    }

    /// The address shown when no provider produced one, e.g. `📍 55.6050, 13.0038`.
    pub fn coordinate_fallback(coordinate: Coordinate) -> Self {
        Self {
            text: format!("{DEGRADED_GLYPH} {coordinate}"),
            source: AddressSource::CoordinateFallback,
            coordinate,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == AddressSource::CoordinateFallback
    }
}

/// Form fields the engine writes to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum AddressField {
    #[serde(rename = "pickupAddress")]
    #[strum(serialize = "pickupAddress")]
    Pickup,
    #[serde(rename = "dropoffAddress")]
    #[strum(serialize = "dropoffAddress")]
    Dropoff,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn fallback_text_matches_ui_format() {
        let c = Coordinate::new(55.6050, 13.0038).unwrap();
        let addr = ResolvedAddress::coordinate_fallback(c);
        assert_eq!(addr.text, "📍 55.6050, 13.0038");
        assert!(addr.is_degraded());
    }

    #[test]
    fn rank_maps_to_source() {
        assert_eq!(AddressSource::for_rank(0), AddressSource::ProviderPrimary);
        assert_eq!(AddressSource::for_rank(1), AddressSource::ProviderBackup);
        assert_eq!(AddressSource::for_rank(4), AddressSource::ProviderBackup);
    }

    #[test]
    fn field_names_match_form() {
        assert_eq!(AddressField::Pickup.as_ref(), "pickupAddress");
        assert_eq!(AddressField::Dropoff.to_string(), "dropoffAddress");
        assert_eq!(
            AddressField::from_str("dropoffAddress").unwrap(),
            AddressField::Dropoff
        );
    }
}
