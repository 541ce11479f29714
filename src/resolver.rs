//! Ordered reverse geocoding with a coordinate fallback.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::circuit_breaker::{CircuitBreakerError, CircuitBreakerRegistry};
use crate::config::EngineConfig;
use crate::errors::{EngineError, ProviderError};
use crate::models::{Coordinate, ResolvedAddress};
use crate::providers::{ConfiguredProviders, GeocodingProvider};

/// Tries each provider in priority order; the first address wins.
///
/// `resolve` never fails. When every provider fails, or is skipped by an open
/// circuit breaker, the result is the degraded coordinate text.
pub struct FallbackResolver {
    providers: Vec<Arc<dyn GeocodingProvider>>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
}

impl std::fmt::Debug for FallbackResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackResolver")
            .field("providers", &self.provider_names())
            .field("circuit_breakers", &self.breakers.is_some())
            .finish()
    }
}

impl FallbackResolver {
    /// `providers[0]` is the primary; the rest are backups, tried in order.
    pub fn new(providers: Vec<Arc<dyn GeocodingProvider>>) -> Self {
        Self {
            providers,
            breakers: None,
        }
    }

    pub fn with_circuit_breakers(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(registry);
        self
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let providers = ConfiguredProviders::from_config(&config.geocoding)?;
        Ok(Self::from_providers(&providers, config))
    }

    pub(crate) fn from_providers(providers: &ConfiguredProviders, config: &EngineConfig) -> Self {
        let resolver = Self::new(providers.ordered());
        if config.circuit_breaker.enabled {
            let registry = CircuitBreakerRegistry::new(Some(config.circuit_breaker.to_breaker_config()));
            resolver.with_circuit_breakers(Arc::new(registry))
        } else {
            resolver
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn circuit_breakers(&self) -> Option<&Arc<CircuitBreakerRegistry>> {
        self.breakers.as_ref()
    }

    #[instrument(skip(self), fields(coordinate = %coordinate))]
    pub async fn resolve(&self, coordinate: Coordinate) -> ResolvedAddress {
        for (rank, provider) in self.providers.iter().enumerate() {
            match self.attempt(provider.as_ref(), coordinate).await {
                Ok(text) => {
                    debug!(provider = provider.name(), rank, "address resolved");
                    return ResolvedAddress::from_provider(text, rank, coordinate);
                }
                Err(err) => {
                    warn!(provider = provider.name(), kind = %err.kind, error = %err, "reverse geocoding failed");
                }
            }
        }

        counter!("geocoding.resolve.degraded", 1);
        warn!("no provider produced an address, using coordinate fallback");
        ResolvedAddress::coordinate_fallback(coordinate)
    }

    /// Like [`resolve`](Self::resolve) but returns the coordinate fallback once
    /// `deadline` elapses.
    pub async fn resolve_with_deadline(&self, coordinate: Coordinate, deadline: Duration) -> ResolvedAddress {
        match tokio::time::timeout(deadline, self.resolve(coordinate)).await {
            Ok(address) => address,
            Err(_) => {
                counter!("geocoding.resolve.degraded", 1);
                warn!(%coordinate, deadline_ms = deadline.as_millis() as u64, "resolution deadline exceeded");
                ResolvedAddress::coordinate_fallback(coordinate)
            }
        }
    }

    async fn attempt(&self, provider: &dyn GeocodingProvider, coordinate: Coordinate) -> Result<String, ProviderError> {
        let name = provider.name();
        let started = Instant::now();

        let call = async {
            let text = provider.reverse_geocode(coordinate).await?;
            let text = text.trim();
            if text.is_empty() {
                Err(ProviderError::bad_response(name, "empty address"))
            } else {
                Ok(text.to_string())
            }
        };

        let outcome = match &self.breakers {
            Some(registry) => match registry
                .get(name)
                .call_counting(|| call, ProviderError::is_outage)
                .await
            {
                Ok(text) => Ok(text),
                Err(CircuitBreakerError::CircuitOpen) => {
                    debug!(provider = name, "circuit open, skipping provider");
                    return Err(ProviderError::unreachable(name, "circuit open"));
                }
                Err(CircuitBreakerError::ServiceFailure(err)) => Err(err),
            },
            None => call.await,
        };

        histogram!(
            "geocoding.provider.latency_ms",
            started.elapsed().as_secs_f64() * 1000.0,
            "provider" => name
        );
        match &outcome {
            Ok(_) => {
                counter!("geocoding.provider.success", 1, "provider" => name);
            }
            Err(err) => {
                counter!(
                    "geocoding.provider.failure",
                    1,
                    "provider" => name,
                    "kind" => err.kind.to_string()
                );
            }
        }
        outcome
    }
}
