use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EngineError;

/// A WGS84 position. Only constructible with in-range, finite values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, EngineError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(EngineError::InvalidCoordinate { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for Coordinate {
    /// Four decimals, roughly 11 m of latitude.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            lat: f64,
            lng: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Coordinate::new(raw.lat, raw.lng).map_err(serde::de::Error::custom)
    }
}

/// Axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Result<Self, EngineError> {
        let corners_valid = Coordinate::new(min_lat, min_lng).is_ok()
            && Coordinate::new(max_lat, max_lng).is_ok();
        if !corners_valid || min_lat >= max_lat || min_lng >= max_lng {
            return Err(EngineError::InvalidServiceArea(format!(
                "bounds ({min_lat}, {min_lng}) .. ({max_lat}, {max_lng}) are not an ordered box"
            )));
        }
        Ok(Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        })
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&coordinate.lat())
            && (self.min_lng..=self.max_lng).contains(&coordinate.lng())
    }

    /// `minLon,minLat,maxLon,maxLat`, the order both Nominatim and Photon take.
    pub fn to_lng_lat_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lng, self.min_lat, self.max_lng, self.max_lat
        )
    }
}

/// The region the ride service operates in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceArea {
    pub name: String,
    pub country_code: Option<String>,
    pub bounds: BoundingBox,
}

impl ServiceArea {
    pub fn new(name: impl Into<String>, country_code: Option<String>, bounds: BoundingBox) -> Self {
        Self {
            name: name.into(),
            country_code: country_code.map(|c| c.to_ascii_lowercase()),
            bounds,
        }
    }

    /// Malmö, Sweden.
    pub fn malmo() -> Self {
        Self::new(
            "Malmö",
            Some("se".to_string()),
            BoundingBox {
                min_lat: 55.50,
                min_lng: 12.85,
                max_lat: 55.66,
                max_lng: 13.15,
            },
        )
    }

    /// True when the text mentions the area name or the coordinate lies in the bounds.
    pub fn covers(&self, display_text: &str, coordinate: &Coordinate) -> bool {
        let name = self.name.trim().to_lowercase();
        let mentions_area = !name.is_empty() && display_text.to_lowercase().contains(&name);
        mentions_area || self.bounds.contains(coordinate)
    }
}
