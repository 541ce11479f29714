use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{
    build_client, compose_address, endpoint, get_json, parse_base_url, street_line,
    GeocodingProvider, HttpSettings,
};
use crate::errors::{EngineError, ProviderError};
use crate::models::{Coordinate, SearchRequest, Suggestion};

/// komoot Photon (`/reverse`, `/api`), GeoJSON responses.
#[derive(Debug, Clone)]
pub struct PhotonProvider {
    client: reqwest::Client,
    base_url: Url,
    accept_language: String,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[lon, lat]`
    coordinates: [f64; 2],
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    name: Option<String>,
    street: Option<String>,
    housenumber: Option<String>,
    postcode: Option<String>,
    city: Option<String>,
    district: Option<String>,
    locality: Option<String>,
    country: Option<String>,
    countrycode: Option<String>,
}

impl Properties {
    fn street(&self) -> Option<String> {
        street_line(self.street.as_deref(), self.housenumber.as_deref())
    }

    fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.locality.as_deref())
            .or(self.district.as_deref())
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// Street address first, then a named place in its locality.
    fn address_line(&self) -> Option<String> {
        compose_address(self.street(), self.locality())
            .or_else(|| compose_address(self.name().map(str::to_string), self.locality()))
    }

    /// `Malmö Opera, Östra Rönneholmsvägen 20, 211 47 Malmö, Sverige`
    fn display_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let street = self.street();
        if let Some(name) = self.name() {
            if self.street.as_deref() != Some(name) {
                parts.push(name.to_string());
            }
        }
        if let Some(street) = street {
            parts.push(street);
        }
        let town = match (self.postcode.as_deref(), self.locality()) {
            (Some(code), Some(town)) => Some(format!("{code} {town}")),
            (None, Some(town)) => Some(town.to_string()),
            _ => None,
        };
        parts.extend(town);
        parts.extend(self.country.clone());
        parts.join(", ")
    }
}

impl Feature {
    fn coordinate(&self) -> Result<Coordinate, ProviderError> {
        let [lng, lat] = self.geometry.coordinates;
        Coordinate::new(lat, lng)
            .map_err(|e| ProviderError::bad_response(PhotonProvider::NAME, e.to_string()))
    }
}

impl PhotonProvider {
    pub const NAME: &'static str = "photon";

    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, EngineError> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: parse_base_url(base_url)?,
            accept_language: settings.accept_language.clone(),
        })
    }

    fn reverse_url(&self, coordinate: Coordinate) -> Url {
        let mut url = endpoint(&self.base_url, "reverse");
        url.query_pairs_mut()
            .append_pair("lat", &coordinate.lat().to_string())
            .append_pair("lon", &coordinate.lng().to_string())
            .append_pair("limit", "1");
        url
    }

    fn search_url(&self, request: &SearchRequest) -> Url {
        let mut url = endpoint(&self.base_url, "api");
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", request.query())
                .append_pair("limit", &request.limit.to_string());
            if let Some(area) = &request.area {
                query.append_pair("bbox", &area.bounds.to_lng_lat_param());
            }
        }
        url
    }
}

#[async_trait]
impl GeocodingProvider for PhotonProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self), fields(provider = "photon"))]
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<String, ProviderError> {
        let collection: FeatureCollection = get_json(
            Self::NAME,
            &self.client,
            self.reverse_url(coordinate),
            &self.accept_language,
        )
        .await?;

        let feature = collection
            .features
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::bad_response(Self::NAME, "no feature at coordinate"))?;

        let text = feature
            .properties
            .address_line()
            .ok_or_else(|| ProviderError::bad_response(Self::NAME, "feature carried no address"))?;

        debug!(%text, "reverse geocoded");
        Ok(text)
    }

    #[instrument(skip(self, request), fields(provider = "photon", query = request.query()))]
    async fn forward_search(&self, request: SearchRequest) -> Result<Vec<Suggestion>, ProviderError> {
        let collection: FeatureCollection = get_json(
            Self::NAME,
            &self.client,
            self.search_url(&request),
            &self.accept_language,
        )
        .await?;

        let country = request
            .area
            .as_ref()
            .and_then(|area| area.country_code.as_deref());

        let mut suggestions = Vec::with_capacity(collection.features.len());
        for feature in &collection.features {
            let props = &feature.properties;
            if let (Some(wanted), Some(actual)) = (country, props.countrycode.as_deref()) {
                if !wanted.eq_ignore_ascii_case(actual) {
                    continue;
                }
            }
            let display_text = props.display_text();
            if display_text.is_empty() {
                continue;
            }
            let coordinate = match feature.coordinate() {
                Ok(coordinate) => coordinate,
                Err(err) => {
                    debug!(error = %err, "skipping feature with unusable geometry");
                    continue;
                }
            };
            let short_label = props
                .street()
                .or_else(|| props.name().map(str::to_string))
                .unwrap_or_else(|| display_text.clone());
            suggestions.push(Suggestion {
                display_text,
                short_label,
                coordinate,
            });
            if suggestions.len() >= request.limit {
                break;
            }
        }
        Ok(suggestions)
    }
}
