//! Debounced street search for one address field.
//!
//! Every keystroke calls [`AutocompleteService::search`]. Each call takes a
//! sequence number and sleeps for the debounce window; only a call that is
//! still the latest when it wakes reaches the provider, and only a response
//! that is still the latest when it arrives replaces the visible list.

use metrics::counter;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, instrument, trace};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::models::{SearchRequest, ServiceArea, Suggestion};
use crate::providers::GeocodingProvider;

/// What one `search` call did to the visible list.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The list was replaced with these suggestions.
    Applied(Vec<Suggestion>),
    /// A newer call, a selection or a clear took over; the list was not touched.
    Superseded,
}

impl SearchOutcome {
    pub fn is_superseded(&self) -> bool {
        matches!(self, SearchOutcome::Superseded)
    }
}

#[derive(Debug, Clone)]
pub struct AutocompleteSettings {
    pub debounce: Duration,
    pub min_query_chars: usize,
    pub max_suggestions: usize,
    pub area: Option<ServiceArea>,
}

impl Default for AutocompleteSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            min_query_chars: 2,
            max_suggestions: 5,
            area: Some(ServiceArea::malmo()),
        }
    }
}

impl AutocompleteSettings {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            debounce: config.debounce(),
            min_query_chars: config.autocomplete.min_query_chars,
            max_suggestions: config.autocomplete.max_suggestions,
            area: Some(config.service_area.to_service_area()?),
        })
    }
}

pub struct AutocompleteService {
    provider: Arc<dyn GeocodingProvider>,
    settings: AutocompleteSettings,
    sequence: AtomicU64,
    visible: Mutex<Vec<Suggestion>>,
}

impl std::fmt::Debug for AutocompleteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutocompleteService")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .finish()
    }
}

impl AutocompleteService {
    pub fn new(provider: Arc<dyn GeocodingProvider>, settings: AutocompleteSettings) -> Self {
        Self {
            provider,
            settings,
            sequence: AtomicU64::new(0),
            visible: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Suggestion>> {
        match self.visible.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, sequence: u64) -> bool {
        self.sequence.load(Ordering::SeqCst) == sequence
    }

    #[instrument(skip(self), fields(provider = self.provider.name(), sequence = tracing::field::Empty))]
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let sequence = self.next_sequence();
        tracing::Span::current().record("sequence", sequence);

        let query = query.trim();
        if query.chars().count() < self.settings.min_query_chars {
            self.lock().clear();
            return SearchOutcome::Applied(Vec::new());
        }

        if !self.settings.debounce.is_zero() {
            tokio::time::sleep(self.settings.debounce).await;
        }
        if !self.is_latest(sequence) {
            trace!("debounced away");
            return SearchOutcome::Superseded;
        }

        let request = match SearchRequest::new(query) {
            Ok(request) => request.limit(self.settings.max_suggestions.max(SearchRequest::DEFAULT_LIMIT)),
            Err(_) => return self.apply(sequence, Vec::new()),
        };
        let request = match &self.settings.area {
            Some(area) => request.within(area.clone()),
            None => request,
        };

        counter!("autocomplete.provider_calls", 1);
        let results = match self.provider.forward_search(request).await {
            Ok(results) => results,
            Err(err) => {
                debug!(error = %err, "search failed, showing no suggestions");
                Vec::new()
            }
        };

        let ranked = rank(query, self.within_area(results), self.settings.max_suggestions);
        self.apply(sequence, ranked)
    }

    fn within_area(&self, results: Vec<Suggestion>) -> Vec<Suggestion> {
        match &self.settings.area {
            Some(area) => results
                .into_iter()
                .filter(|s| area.covers(&s.display_text, &s.coordinate))
                .collect(),
            None => results,
        }
    }

    fn apply(&self, sequence: u64, suggestions: Vec<Suggestion>) -> SearchOutcome {
        let mut visible = self.lock();
        if !self.is_latest(sequence) {
            counter!("autocomplete.stale_discarded", 1);
            debug!(sequence, "discarding stale suggestions");
            return SearchOutcome::Superseded;
        }
        *visible = suggestions.clone();
        SearchOutcome::Applied(suggestions)
    }

    /// The list currently shown under the field.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.lock().clone()
    }

    /// Takes the suggestion at `index`, clears the list and drops in-flight searches.
    pub fn select(&self, index: usize) -> Option<Suggestion> {
        let mut visible = self.lock();
        if index >= visible.len() {
            return None;
        }
        self.next_sequence();
        let chosen = visible.swap_remove(index);
        visible.clear();
        Some(chosen)
    }

    pub fn clear(&self) {
        let mut visible = self.lock();
        self.next_sequence();
        visible.clear();
    }
}

/// Dedupes by display text, then orders prefix matches on the short label
/// before substring matches, keeping provider order within each tier.
fn rank(query: &str, results: Vec<Suggestion>, max: usize) -> Vec<Suggestion> {
    let needle = query.to_lowercase();
    let mut seen = HashSet::new();

    let mut tiered: Vec<(u8, Suggestion)> = results
        .into_iter()
        .filter(|s| seen.insert(s.display_text.trim().to_lowercase()))
        .map(|s| {
            let label = s.short_label.to_lowercase();
            let tier = if label.starts_with(&needle) {
                0
            } else if label.contains(&needle) {
                1
            } else {
                2
            };
            (tier, s)
        })
        .collect();

    tiered.sort_by_key(|(tier, _)| *tier);
    tiered.into_iter().take(max).map(|(_, s)| s).collect()
}
