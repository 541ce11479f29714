use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{
    build_client, compose_address, endpoint, first_segment, get_json, parse_base_url,
    street_line, GeocodingProvider, HttpSettings,
};
use crate::errors::{EngineError, ProviderError};
use crate::models::{Coordinate, SearchRequest, Suggestion};

/// OpenStreetMap Nominatim (`/reverse`, `/search`, `format=jsonv2`).
#[derive(Debug, Clone)]
pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: Url,
    accept_language: String,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    pedestrian: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl NominatimAddress {
    fn street(&self) -> Option<String> {
        let road = self.road.as_deref().or(self.pedestrian.as_deref());
        street_line(road, self.house_number.as_deref())
    }

    fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
            .or(self.suburb.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: Option<String>,
    address: Option<NominatimAddress>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

impl NominatimProvider {
    pub const NAME: &'static str = "nominatim";

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
            .append_pair("format", "jsonv2")
            .append_pair("lat", &coordinate.lat().to_string())
            .append_pair("lon", &coordinate.lng().to_string())
            .append_pair("zoom", "18")
            .append_pair("addressdetails", "1");
        url
    }

    fn search_url(&self, request: &SearchRequest) -> Url {
        let mut url = endpoint(&self.base_url, "search");
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("format", "jsonv2")
                .append_pair("q", request.query())
                .append_pair("limit", &request.limit.to_string())
                .append_pair("addressdetails", "1");
            if let Some(area) = &request.area {
                if let Some(code) = &area.country_code {
                    query.append_pair("countrycodes", code);
                }
                query
                    .append_pair("viewbox", &area.bounds.to_lng_lat_param())
                    .append_pair("bounded", "1");
            }
        }
        url
    }

    fn to_suggestion(result: SearchResult) -> Result<Suggestion, ProviderError> {
        let lat = result.lat.parse::<f64>().map_err(|e| {
            ProviderError::bad_response(Self::NAME, format!("invalid lat {:?}: {e}", result.lat))
        })?;
        let lng = result.lon.parse::<f64>().map_err(|e| {
            ProviderError::bad_response(Self::NAME, format!("invalid lon {:?}: {e}", result.lon))
        })?;
        let coordinate = Coordinate::new(lat, lng)
            .map_err(|e| ProviderError::bad_response(Self::NAME, e.to_string()))?;

        let short_label = result
            .address
            .as_ref()
            .and_then(NominatimAddress::street)
            .or(result.name.filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| first_segment(&result.display_name));

        Ok(Suggestion {
            display_text: result.display_name,
            short_label,
            coordinate,
        })
    }
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self), fields(provider = "nominatim"))]
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<String, ProviderError> {
        let result: ReverseResult = get_json(
            Self::NAME,
            &self.client,
            self.reverse_url(coordinate),
            &self.accept_language,
        )
        .await?;

        if let Some(message) = result.error {
            return Err(ProviderError::bad_response(Self::NAME, message));
        }

        let address = result.address.unwrap_or_default();
        let text = compose_address(address.street(), address.locality())
            .or(result.display_name)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::bad_response(Self::NAME, "response carried no address"))?;

        debug!(%text, "reverse geocoded");
        Ok(text)
    }

    #[instrument(skip(self, request), fields(provider = "nominatim", query = request.query()))]
    async fn forward_search(&self, request: SearchRequest) -> Result<Vec<Suggestion>, ProviderError> {
        let results: Vec<SearchResult> = get_json(
            Self::NAME,
            &self.client,
            self.search_url(&request),
            &self.accept_language,
        )
        .await?;

        let suggestions = results
            .into_iter()
            .filter_map(|result| match Self::to_suggestion(result) {
                Ok(suggestion) => Some(suggestion),
                Err(err) => {
                    debug!(error = %err, "skipping unusable search result");
                    None
                }
            })
            .take(request.limit)
            .collect();
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderErrorKind;
    use crate::models::ServiceArea;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, timeout: Duration) -> NominatimProvider {
        let settings = HttpSettings {
            timeout,
            ..HttpSettings::default()
        };
        NominatimProvider::new(&server.uri(), &settings).unwrap()
    }

    fn stortorget() -> Coordinate {
        Coordinate::new(55.6050, 13.0038).unwrap()
    }

    #[tokio::test]
    async fn reverse_formats_street_and_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "jsonv2"))
            .and(query_param("addressdetails", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "1, Stortorget, Gamla staden, Malmö, Sverige",
                "address": {
                    "house_number": "1",
                    "road": "Stortorget",
                    "suburb": "Gamla staden",
                    "city": "Malmö"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server, Duration::from_secs(2))
            .reverse_geocode(stortorget())
            .await
            .unwrap();
        assert_eq!(text, "Stortorget 1, Malmö");
    }

    #[tokio::test]
    async fn reverse_falls_back_to_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Pildammsparken, Malmö, Sverige",
                "address": { "city": "Malmö" }
            })))
            .mount(&server)
            .await;

        let text = provider(&server, Duration::from_secs(2))
            .reverse_geocode(stortorget())
            .await
            .unwrap();
        assert_eq!(text, "Pildammsparken, Malmö, Sverige");
    }

    #[tokio::test]
    async fn error_body_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(2))
            .reverse_geocode(stortorget())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::BadResponse);
        assert_eq!(err.provider, "nominatim");
        assert!(!err.is_outage());
    }

    #[tokio::test]
    async fn non_success_status_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(2))
            .reverse_geocode(stortorget())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::BadResponse);
        assert!(err.message.contains("429"));
        assert_eq!(err.status, Some(429));
        assert!(err.is_outage());
    }

    #[tokio::test]
    async fn malformed_payload_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(2))
            .reverse_geocode(stortorget())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::BadResponse);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "display_name": "late" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(50))
            .reverse_geocode(stortorget())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Timeout);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let settings = HttpSettings {
            timeout: Duration::from_secs(2),
            ..HttpSettings::default()
        };
        let provider = NominatimProvider::new("http://127.0.0.1:9", &settings).unwrap();
        let err = provider.reverse_geocode(stortorget()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Unreachable);
    }

    #[tokio::test]
    async fn search_sends_bounds_and_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Malmögatan"))
            .and(query_param("countrycodes", "se"))
            .and(query_param("viewbox", "12.85,55.5,13.15,55.66"))
            .and(query_param("bounded", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "lat": "55.5942",
                    "lon": "13.0010",
                    "display_name": "Malmögatan, Västra Innerstaden, Malmö, Sverige",
                    "name": "Malmögatan",
                    "address": { "road": "Malmögatan", "city": "Malmö" }
                },
                {
                    "lat": "55.6001",
                    "lon": "13.0102",
                    "display_name": "Malmö Opera, Östra Rönneholmsvägen, Malmö, Sverige",
                    "name": "Malmö Opera"
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let request = SearchRequest::new("Malmögatan")
            .unwrap()
            .within(ServiceArea::malmo())
            .limit(5);
        let suggestions = provider(&server, Duration::from_secs(2))
            .forward_search(request)
            .await
            .unwrap();

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].short_label, "Malmögatan");
        assert_eq!(suggestions[1].short_label, "Malmö Opera");
        assert_eq!(suggestions[0].coordinate.lat(), 55.5942);
    }

    #[tokio::test]
    async fn search_skips_results_with_garbage_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "lat": "north", "lon": "13.0", "display_name": "x" },
                { "lat": "95.0", "lon": "13.0", "display_name": "y" },
                {
                    "lat": "55.6094",
                    "lon": "13.0001",
                    "display_name": "Malmö C, Malmö, Sverige",
                    "name": "Malmö C"
                }
            ])))
            .mount(&server)
            .await;

        let suggestions = provider(&server, Duration::from_secs(2))
            .forward_search(SearchRequest::new("Malmö").unwrap())
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].short_label, "Malmö C");
    }
}
