/*!
 * # Circuit Breaker
 *
 * Per-provider circuit breakers. A provider that keeps failing is skipped
 * without a network call until its reset timeout elapses, after which a
 * limited number of trial calls decide whether it is healthy again.
 */

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing trial requests to test recovery
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to wait before transitioning from Open to HalfOpen
    pub timeout: Duration,
    /// Successful requests needed in HalfOpen to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 1,
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
        }
    }
}

/// Circuit breaker errors
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    CircuitOpen,
    #[error("Service call failed: {0}")]
    ServiceFailure(E),
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<CircuitBreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(CircuitBreakerState::closed()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Runs `f` unless the circuit is open, recording the outcome.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_counting(f, |_| true).await
    }

    /// Like [`call`](Self::call), but only errors for which `counts` returns
    /// true are recorded as failures. Other errors are passed through and
    /// recorded as a healthy answer.
    pub async fn call_counting<F, Fut, T, E, P>(&self, f: F, counts: P) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        if !self.allows_request() {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if counts(&err) {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Err(CircuitBreakerError::ServiceFailure(err))
            }
        }
    }

    /// Check if the circuit breaker allows execution
    pub fn allows_request(&self) -> bool {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => match state.last_failure_time {
                Some(last_failure) if last_failure.elapsed() >= self.config.timeout => {
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    info!(breaker = %self.name, "circuit half-open, allowing trial request");
                    true
                }
                _ => false,
            },
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    *state = CircuitBreakerState::closed();
                    info!(breaker = %self.name, "circuit closed");
                }
            }
            CircuitState::Open => {
                *state = CircuitBreakerState::closed();
            }
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();

        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    warn!(
                        breaker = %self.name,
                        failures = state.failure_count,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.success_count = 0;
                warn!(breaker = %self.name, "trial request failed, circuit re-opened");
            }
            CircuitState::Open => {}
        }
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }
}

/// Registry for managing one circuit breaker per provider
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: Option<CircuitBreakerConfig>) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            default_config: default_config.unwrap_or_default(),
        }
    }

    /// Get or create a circuit breaker for the given provider
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = match self.breakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.default_config.clone())))
            .clone()
    }

    pub fn states(&self) -> HashMap<String, CircuitState> {
        let breakers = match self.breakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }
}
