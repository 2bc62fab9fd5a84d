//! Domain core for the place directory.
//!
//! This crate is the query/domain engine behind the catalog API: the
//! category tree ("classes"), geo-located places with per-locale
//! content, weekly opening-hours timetables, and the composite place
//! search. Transport, request decoding, and response shaping live in
//! the embedding service; callers construct the services over a
//! [`sqlx::PgPool`] and speak plain parameter structs.

pub mod core;
pub mod features;
pub mod shared;

pub use crate::core::error::{AppError, Result};
pub use crate::features::classes::ClassService;
pub use crate::features::places::{NominatimGeocoder, PlaceService, ReverseGeocoder};
pub use crate::features::timetables::TimetableService;
