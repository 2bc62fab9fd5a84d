mod geocoding_service;
mod place_service;
mod search;

pub use geocoding_service::{NominatimGeocoder, ReverseGeocoder};
pub use place_service::PlaceService;
