//! In-process provider with scripted answers.
//!
//! Backs `ride-locator simulate --offline` and the test suites. Outcomes can
//! carry an artificial latency, which runs on the tokio clock so paused-time
//! tests stay deterministic.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

use super::GeocodingProvider;
use crate::errors::{ProviderError, ProviderErrorKind};
use crate::models::{Coordinate, SearchRequest, Suggestion};

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Reverse(Coordinate),
    Search(String),
}

#[derive(Debug, Clone)]
struct Scripted<T> {
    outcome: Result<T, ProviderErrorKind>,
    latency: Duration,
}

impl<T> Scripted<T> {
    fn ok(value: T) -> Self {
        Self {
            outcome: Ok(value),
            latency: Duration::ZERO,
        }
    }

    fn err(kind: ProviderErrorKind) -> Self {
        Self {
            outcome: Err(kind),
            latency: Duration::ZERO,
        }
    }

    fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[derive(Debug)]
pub struct ScriptedProvider {
    name: &'static str,
    default_reverse: Scripted<String>,
    queued_reverse: Mutex<VecDeque<Scripted<String>>>,
    default_search: Scripted<Vec<Suggestion>>,
    searches: HashMap<String, Scripted<Vec<Suggestion>>>,
    calls: Mutex<Vec<ProviderCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ScriptedProvider {
    /// Reverse lookups fail with `BadResponse` and searches return nothing
    /// until scripted otherwise.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            default_reverse: Scripted::err(ProviderErrorKind::BadResponse),
            queued_reverse: Mutex::new(VecDeque::new()),
            default_search: Scripted::ok(Vec::new()),
            searches: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every reverse lookup answers `text`.
    pub fn with_address(mut self, text: impl Into<String>) -> Self {
        self.default_reverse = Scripted::ok(text.into());
        self
    }

    /// Every call without a more specific script fails with `kind`.
    pub fn failing(mut self, kind: ProviderErrorKind) -> Self {
        self.default_reverse = Scripted::err(kind);
        self.default_search = Scripted::err(kind);
        self
    }

    /// Delay applied to the default reverse outcome.
    pub fn with_reverse_latency(mut self, latency: Duration) -> Self {
        self.default_reverse.latency = latency;
        self
    }

    /// Queues a one-shot reverse answer, consumed in FIFO order before the default.
    pub fn then_address(self, text: impl Into<String>, latency: Duration) -> Self {
        lock(&self.queued_reverse).push_back(Scripted::ok(text.into()).after(latency));
        self
    }

    pub fn then_error(self, kind: ProviderErrorKind, latency: Duration) -> Self {
        lock(&self.queued_reverse).push_back(Scripted::err(kind).after(latency));
        self
    }

    pub fn with_results(self, query: &str, results: Vec<Suggestion>) -> Self {
        self.with_results_after(query, results, Duration::ZERO)
    }

    pub fn with_results_after(
        mut self,
        query: &str,
        results: Vec<Suggestion>,
        latency: Duration,
    ) -> Self {
        self.searches
            .insert(query.to_string(), Scripted::ok(results).after(latency));
        self
    }

    pub fn with_search_error(mut self, query: &str, kind: ProviderErrorKind) -> Self {
        self.searches.insert(query.to_string(), Scripted::err(kind));
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.calls).clone()
    }

    pub fn reverse_calls(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, ProviderCall::Reverse(_)))
            .count()
    }

    pub fn search_calls(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, ProviderCall::Search(_)))
            .count()
    }

    fn record(&self, call: ProviderCall) {
        trace!(provider = self.name, ?call, "scripted call");
        lock(&self.calls).push(call);
    }

    async fn play<T>(&self, script: Scripted<T>) -> Result<T, ProviderError> {
        if !script.latency.is_zero() {
            tokio::time::sleep(script.latency).await;
        }
        script
            .outcome
            .map_err(|kind| ProviderError::new(kind, self.name, "scripted failure"))
    }
}

#[async_trait]
impl GeocodingProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<String, ProviderError> {
        self.record(ProviderCall::Reverse(coordinate));
        let script = lock(&self.queued_reverse)
            .pop_front()
            .unwrap_or_else(|| self.default_reverse.clone());
        self.play(script).await
    }

    async fn forward_search(&self, request: SearchRequest) -> Result<Vec<Suggestion>, ProviderError> {
        self.record(ProviderCall::Search(request.query().to_string()));
        let script = self
            .searches
            .get(request.query())
            .cloned()
            .unwrap_or_else(|| self.default_search.clone());
        let mut results = self.play(script).await?;
        results.truncate(request.limit);
        Ok(results)
    }
}
