//! One open booking form: the selector plus an autocomplete per address field.

use std::sync::Arc;
use tracing::info;

use crate::autocomplete::{AutocompleteService, AutocompleteSettings, SearchOutcome};
use crate::config::EngineConfig;
use crate::errors::{EngineError, GpsError};
use crate::models::{AddressField, Coordinate, SelectionSlot, Suggestion};
use crate::providers::ConfiguredProviders;
use crate::resolver::FallbackResolver;
use crate::selection::{FormSurface, LocationSelector, MapSurface, SlotResolution};

#[derive(Debug)]
pub struct BookingSession {
    selector: LocationSelector,
    pickup_search: AutocompleteService,
    dropoff_search: AutocompleteService,
}

impl BookingSession {
    /// Builds HTTP adapters from `config.geocoding`.
    pub fn from_config(
        config: &EngineConfig,
        form: Arc<dyn FormSurface>,
        map: Arc<dyn MapSurface>,
    ) -> Result<Self, EngineError> {
        let providers = ConfiguredProviders::from_config(&config.geocoding)?;
        Self::with_providers(config, providers, form, map)
    }

    pub fn with_providers(
        config: &EngineConfig,
        providers: ConfiguredProviders,
        form: Arc<dyn FormSurface>,
        map: Arc<dyn MapSurface>,
    ) -> Result<Self, EngineError> {
        let resolver = Arc::new(FallbackResolver::from_providers(&providers, config));
        let selector = LocationSelector::new(resolver, form, map, config.selection.clone());

        let settings = AutocompleteSettings::from_config(config)?;
        let search_provider = providers.for_role(config.autocomplete.provider);
        info!(
            resolver = ?providers.ordered().iter().map(|p| p.name()).collect::<Vec<_>>(),
            autocomplete = search_provider.name(),
            "booking session ready"
        );

        Ok(Self {
            selector,
            pickup_search: AutocompleteService::new(search_provider.clone(), settings.clone()),
            dropoff_search: AutocompleteService::new(search_provider, settings),
        })
    }

    pub fn selector(&self) -> &LocationSelector {
        &self.selector
    }

    pub fn autocomplete(&self, field: AddressField) -> &AutocompleteService {
        match field {
            AddressField::Pickup => &self.pickup_search,
            AddressField::Dropoff => &self.dropoff_search,
        }
    }

    pub fn armed_slot(&self) -> SelectionSlot {
        self.selector.armed_slot()
    }

    pub async fn on_click(&self, coordinate: Coordinate) -> SlotResolution {
        self.selector.on_click(coordinate).await
    }

    pub async fn on_fix_acquired(&self, coordinate: Coordinate) -> Option<SlotResolution> {
        self.selector.on_fix_acquired(coordinate).await
    }

    pub fn on_fix_failed(&self, error: GpsError) -> &'static str {
        self.selector.on_fix_failed(error)
    }

    /// Also empties both suggestion lists.
    pub fn reset(&self) {
        self.pickup_search.clear();
        self.dropoff_search.clear();
        self.selector.reset();
    }

    pub async fn type_query(&self, field: AddressField, query: &str) -> SearchOutcome {
        self.autocomplete(field).search(query).await
    }

    /// Picks a visible suggestion and writes it into `field`.
    pub fn choose_suggestion(&self, field: AddressField, index: usize) -> Option<Suggestion> {
        let suggestion = self.autocomplete(field).select(index)?;
        self.selector.apply_suggestion(field, &suggestion);
        Some(suggestion)
    }
}
