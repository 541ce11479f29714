// Core value types shared by providers, resolver and selection
pub mod address;
pub mod geo;
pub mod marker;
pub mod suggestion;

pub use address::{AddressField, AddressSource, ResolvedAddress, DEGRADED_GLYPH};
pub use geo::{BoundingBox, Coordinate, ServiceArea};
pub use marker::{Marker, MarkerSlot, SelectionSlot};
pub use suggestion::{SearchRequest, Suggestion};
