#![allow(dead_code)]

use std::sync::Arc;

use ride_locator::{
    config::EngineConfig,
    providers::{ConfiguredProviders, ScriptedProvider},
    surfaces::{InMemoryForm, InMemoryMap},
    BookingSession, Coordinate, Suggestion,
};

/// A booking session wired to scripted providers and in-memory surfaces.
pub struct TestSession {
    pub session: BookingSession,
    pub form: Arc<InMemoryForm>,
    pub map: Arc<InMemoryMap>,
    pub primary: Arc<ScriptedProvider>,
    pub backup: Arc<ScriptedProvider>,
}

impl TestSession {
    pub fn new(primary: ScriptedProvider, backup: ScriptedProvider) -> Self {
        Self::with_config(EngineConfig::default(), primary, backup)
    }

    pub fn with_config(config: EngineConfig, primary: ScriptedProvider, backup: ScriptedProvider) -> Self {
        let form = Arc::new(InMemoryForm::new());
        let map = Arc::new(InMemoryMap::new());
        let primary = Arc::new(primary);
        let backup = Arc::new(backup);

        let session = BookingSession::with_providers(
            &config,
            ConfiguredProviders {
                primary: primary.clone(),
                backup: Some(backup.clone()),
            },
            form.clone(),
            map.clone(),
        )
        .expect("session builds from default config");

        Self {
            session,
            form,
            map,
            primary,
            backup,
        }
    }
}

pub fn coordinate(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).expect("valid coordinate")
}

pub fn suggestion(label: &str, lat: f64, lng: f64) -> Suggestion {
    Suggestion {
        display_text: format!("{label}, Malmö, Sverige"),
        short_label: label.to_string(),
        coordinate: coordinate(lat, lng),
    }
}
