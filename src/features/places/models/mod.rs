mod place;

pub use place::{GeoPoint, Place, PlaceLocale, PlaceStatus, EARTH_RADIUS_METERS};
