//! Pickup/dropoff selection driven by map clicks and GPS fixes.
//!
//! The armed slot cycles PICKUP → DROPOFF → PICKUP for the life of a session.
//! A click captures and advances the armed slot before resolving, so a slow
//! resolution can never land in the wrong field. Each slot carries a request
//! token; a resolution whose token is no longer current is dropped.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::{GpsRecenterPolicy, SelectionConfig};
use crate::errors::GpsError;
use crate::models::{AddressField, Coordinate, Marker, MarkerSlot, ResolvedAddress, SelectionSlot, Suggestion};
use crate::resolver::FallbackResolver;

/// Interim field value while a resolution is in flight.
pub const RESOLVING_PLACEHOLDER: &str = "Resolving…";

pub const CURRENT_LOCATION_LABEL: &str = "Your location";

/// The booking form's address fields.
pub trait FormSurface: Send + Sync {
    fn set_field(&self, field: AddressField, value: &str);
    fn field(&self, field: AddressField) -> String;
}

/// The map widget. Upserting a marker replaces any marker in the same slot.
pub trait MapSurface: Send + Sync {
    fn upsert_marker(&self, marker: Marker);
    fn remove_marker(&self, slot: MarkerSlot);
    fn recenter(&self, coordinate: Coordinate, zoom: u8);
}

/// The outcome of one click or GPS-driven resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotResolution {
    pub slot: SelectionSlot,
    pub address: ResolvedAddress,
    /// False when a newer click, suggestion or reset superseded this request.
    pub applied: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotRequest {
    token: u64,
    in_flight: bool,
}

#[derive(Debug)]
struct SelectionState {
    armed: SelectionSlot,
    issued: u64,
    pickup: SlotRequest,
    dropoff: SlotRequest,
    recentered: bool,
}

impl SelectionState {
    fn new() -> Self {
        Self {
            armed: SelectionSlot::Pickup,
            issued: 0,
            pickup: SlotRequest::default(),
            dropoff: SlotRequest::default(),
            recentered: false,
        }
    }

    fn request(&mut self, slot: SelectionSlot) -> &mut SlotRequest {
        match slot {
            SelectionSlot::Pickup => &mut self.pickup,
            SelectionSlot::Dropoff => &mut self.dropoff,
        }
    }

    /// Starts a new request for `slot`, superseding any in flight.
    fn issue(&mut self, slot: SelectionSlot) -> u64 {
        self.issued += 1;
        let token = self.issued;
        *self.request(slot) = SlotRequest {
            token,
            in_flight: true,
        };
        token
    }

    fn invalidate(&mut self, slot: SelectionSlot) {
        self.issued += 1;
        let token = self.issued;
        *self.request(slot) = SlotRequest {
            token,
            in_flight: false,
        };
    }
}

pub struct LocationSelector {
    resolver: Arc<FallbackResolver>,
    form: Arc<dyn FormSurface>,
    map: Arc<dyn MapSurface>,
    config: SelectionConfig,
    deadline: Option<Duration>,
    state: Mutex<SelectionState>,
}

impl std::fmt::Debug for LocationSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationSelector")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl LocationSelector {
    pub fn new(
        resolver: Arc<FallbackResolver>,
        form: Arc<dyn FormSurface>,
        map: Arc<dyn MapSurface>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            resolver,
            form,
            map,
            config,
            deadline: None,
            state: Mutex::new(SelectionState::new()),
        }
    }

    /// Caps each resolution; on expiry the coordinate fallback is written.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The slot the next click fills.
    pub fn armed_slot(&self) -> SelectionSlot {
        self.lock().armed
    }

    /// Slots with a resolution in flight.
    pub fn pending(&self) -> Vec<SelectionSlot> {
        let state = self.lock();
        [SelectionSlot::Pickup, SelectionSlot::Dropoff]
            .into_iter()
            .filter(|slot| match slot {
                SelectionSlot::Pickup => state.pickup.in_flight,
                SelectionSlot::Dropoff => state.dropoff.in_flight,
            })
            .collect()
    }

    #[instrument(skip(self), fields(coordinate = %coordinate))]
    pub async fn on_click(&self, coordinate: Coordinate) -> SlotResolution {
        let (slot, token) = {
            let mut state = self.lock();
            let slot = state.armed;
            state.armed = slot.next();
            let token = state.issue(slot);
            self.form.set_field(slot.field(), RESOLVING_PLACEHOLDER);
            (slot, token)
        };
        debug!(%slot, token, "click captured");

        let address = self.resolve(coordinate).await;
        let applied = self.complete(slot, token, &address, true);
        SlotResolution {
            slot,
            address,
            applied,
        }
    }

    /// Clears both fields and their markers and re-arms PICKUP. The CURRENT
    /// marker stays.
    #[instrument(skip(self))]
    pub fn reset(&self) {
        let mut state = self.lock();
        for slot in [SelectionSlot::Pickup, SelectionSlot::Dropoff] {
            state.invalidate(slot);
            self.form.set_field(slot.field(), "");
            self.map.remove_marker(slot.into());
        }
        state.armed = SelectionSlot::Pickup;
        info!("selection reset");
    }

    /// Moves the CURRENT marker and fills an empty pickup field. Returns the
    /// pickup resolution when one was started.
    #[instrument(skip(self), fields(coordinate = %coordinate))]
    pub async fn on_fix_acquired(&self, coordinate: Coordinate) -> Option<SlotResolution> {
        let token = {
            let mut state = self.lock();
            self.map
                .upsert_marker(Marker::new(MarkerSlot::Current, coordinate, CURRENT_LOCATION_LABEL));

            let recenter = match self.config.recenter_policy {
                GpsRecenterPolicy::Always => true,
                GpsRecenterPolicy::FirstFixOnly => !state.recentered,
                GpsRecenterPolicy::Never => false,
            };
            if recenter {
                self.map.recenter(coordinate, self.config.recenter_zoom);
                state.recentered = true;
            }

            if !self.form.field(AddressField::Pickup).trim().is_empty() {
                debug!("pickup already set, keeping it");
                return None;
            }
            let token = state.issue(SelectionSlot::Pickup);
            self.form.set_field(AddressField::Pickup, RESOLVING_PLACEHOLDER);
            token
        };

        let address = self.resolve(coordinate).await;
        // The CURRENT marker already sits on this spot.
        let applied = self.complete(SelectionSlot::Pickup, token, &address, false);
        Some(SlotResolution {
            slot: SelectionSlot::Pickup,
            address,
            applied,
        })
    }

    /// Guidance text for the UI. Nothing is retried.
    pub fn on_fix_failed(&self, error: GpsError) -> &'static str {
        warn!(%error, "location fix failed");
        error.guidance()
    }

    /// Writes a chosen autocomplete suggestion into `field` and drops any
    /// click resolution still in flight for it. The armed slot is unchanged.
    #[instrument(skip(self, suggestion), fields(label = %suggestion.short_label))]
    pub fn apply_suggestion(&self, field: AddressField, suggestion: &Suggestion) {
        let slot = SelectionSlot::from(field);
        let mut state = self.lock();
        state.invalidate(slot);
        self.form.set_field(field, &suggestion.display_text);
        self.map.upsert_marker(Marker::new(
            slot.into(),
            suggestion.coordinate,
            suggestion.short_label.clone(),
        ));
    }

    async fn resolve(&self, coordinate: Coordinate) -> ResolvedAddress {
        match self.deadline {
            Some(deadline) => self.resolver.resolve_with_deadline(coordinate, deadline).await,
            None => self.resolver.resolve(coordinate).await,
        }
    }

    fn complete(&self, slot: SelectionSlot, token: u64, address: &ResolvedAddress, with_marker: bool) -> bool {
        let mut state = self.lock();
        let request = state.request(slot);
        if request.token != token {
            debug!(%slot, token, current = request.token, "discarding superseded resolution");
            return false;
        }
        request.in_flight = false;

        self.form.set_field(slot.field(), &address.text);
        if with_marker {
            self.map
                .upsert_marker(Marker::new(slot.into(), address.coordinate, address.text.clone()));
        }
        true
    }
}
