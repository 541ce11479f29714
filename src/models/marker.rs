use serde::{Deserialize, Serialize};
use strum::Display;

use super::address::AddressField;
use super::geo::Coordinate;

/// Marker slots on the map. One marker per slot at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkerSlot {
    /// The device's own GPS position
    Current,
    Pickup,
    Dropoff,
    Demo,
}

impl From<SelectionSlot> for MarkerSlot {
    fn from(slot: SelectionSlot) -> Self {
        match slot {
            SelectionSlot::Pickup => MarkerSlot::Pickup,
            SelectionSlot::Dropoff => MarkerSlot::Dropoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub coordinate: Coordinate,
    pub label: String,
    pub slot: MarkerSlot,
}

impl Marker {
    pub fn new(slot: MarkerSlot, coordinate: Coordinate, label: impl Into<String>) -> Self {
        Self {
            coordinate,
            label: label.into(),
            slot,
        }
    }
}

/// The two slots a map click can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionSlot {
    Pickup,
    Dropoff,
}

impl SelectionSlot {
    /// The slot armed after this one has been filled.
    pub fn next(self) -> Self {
        match self {
            SelectionSlot::Pickup => SelectionSlot::Dropoff,
            SelectionSlot::Dropoff => SelectionSlot::Pickup,
        }
    }

    pub fn field(self) -> AddressField {
        match self {
            SelectionSlot::Pickup => AddressField::Pickup,
            SelectionSlot::Dropoff => AddressField::Dropoff,
        }
    }
}

impl From<AddressField> for SelectionSlot {
    fn from(field: AddressField) -> Self {
        match field {
            AddressField::Pickup => SelectionSlot::Pickup,
            AddressField::Dropoff => SelectionSlot::Dropoff,
        }
    }
}
