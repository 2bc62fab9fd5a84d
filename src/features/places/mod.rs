//! Geo-located places and the composite place search.

pub mod dtos;
pub mod models;
pub mod services;

pub use services::{NominatimGeocoder, PlaceService, ReverseGeocoder};
