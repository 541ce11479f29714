//! In-memory form and map surfaces.
//!
//! Used by the CLI's `simulate` command and the test suites in place of a
//! browser form and map widget.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::models::{AddressField, Coordinate, Marker, MarkerSlot};
use crate::selection::{FormSurface, MapSurface};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
struct FormState {
    values: HashMap<AddressField, String>,
    writes: Vec<(AddressField, String)>,
}

/// Address fields held in memory, with every write recorded in order.
#[derive(Debug, Default)]
pub struct InMemoryForm {
    state: Mutex<FormState>,
}

impl InMemoryForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(AddressField, String)> {
        lock(&self.state).writes.clone()
    }

    /// Pickup then dropoff.
    pub fn snapshot(&self) -> Vec<(AddressField, String)> {
        [AddressField::Pickup, AddressField::Dropoff]
            .into_iter()
            .map(|field| (field, self.field(field)))
            .collect()
    }
}

impl FormSurface for InMemoryForm {
    fn set_field(&self, field: AddressField, value: &str) {
        let mut state = lock(&self.state);
        state.values.insert(field, value.to_string());
        state.writes.push((field, value.to_string()));
    }

    fn field(&self, field: AddressField) -> String {
        lock(&self.state)
            .values
            .get(&field)
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recenter {
    pub coordinate: Coordinate,
    pub zoom: u8,
}

#[derive(Debug, Default)]
struct MapState {
    markers: BTreeMap<MarkerSlot, Marker>,
    recenters: Vec<Recenter>,
}

/// Markers keyed by slot; upserting replaces the slot's previous marker.
#[derive(Debug, Default)]
pub struct InMemoryMap {
    state: Mutex<MapState>,
}

impl InMemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current markers in slot order.
    pub fn markers(&self) -> Vec<Marker> {
        lock(&self.state).markers.values().cloned().collect()
    }

    pub fn marker(&self, slot: MarkerSlot) -> Option<Marker> {
        lock(&self.state).markers.get(&slot).cloned()
    }

    pub fn recenters(&self) -> Vec<(Coordinate, u8)> {
        lock(&self.state)
            .recenters
            .iter()
            .map(|r| (r.coordinate, r.zoom))
            .collect()
    }
}

impl MapSurface for InMemoryMap {
    fn upsert_marker(&self, marker: Marker) {
        lock(&self.state).markers.insert(marker.slot, marker);
    }

    fn remove_marker(&self, slot: MarkerSlot) {
        lock(&self.state).markers.remove(&slot);
    }

    fn recenter(&self, coordinate: Coordinate, zoom: u8) {
        lock(&self.state).recenters.push(Recenter { coordinate, zoom });
    }
}
