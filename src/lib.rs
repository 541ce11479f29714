//! Ride Locator Library
//!
//! Location resolution for a ride-booking form: reverse geocoding with an
//! ordered provider fallback, debounced street autocomplete, and the
//! pickup/dropoff selection sequence driven by map clicks and GPS fixes.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod autocomplete;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod surfaces;

pub use autocomplete::{AutocompleteService, AutocompleteSettings, SearchOutcome};
pub use config::{load_config, EngineConfig};
pub use errors::{EngineError, GpsError, ProviderError, ProviderErrorKind};
pub use models::{
    AddressField, AddressSource, Coordinate, Marker, MarkerSlot, ResolvedAddress, SelectionSlot,
    ServiceArea, Suggestion,
};
pub use providers::{ConfiguredProviders, GeocodingProvider};
pub use resolver::FallbackResolver;
pub use selection::{FormSurface, LocationSelector, MapSurface, SlotResolution};
pub use session::BookingSession;
