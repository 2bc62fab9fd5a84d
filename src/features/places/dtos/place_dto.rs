use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::places::models::{GeoPoint, Place, PlaceLocale, PlaceStatus};
use crate::features::timetables::models::TimeWindow;
use crate::shared::locale;

/// Parameters for creating a place
///
/// `name`/`address`/`description` seed the default-locale content row.
/// When `address` is absent the reverse geocoder fills it in.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlaceParams {
    pub city_id: Uuid,
    pub distributor_id: Option<Uuid>,
    pub class_code: String,
    pub point: GeoPoint,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
}

/// Parameters for updating a place; absent fields are left untouched
///
/// An empty string for `website`/`phone` clears the field to absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePlaceParams {
    pub class_code: Option<String>,
    pub point: Option<GeoPoint>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Per-locale content for a place
#[derive(Debug, Clone, Deserialize)]
pub struct SetPlaceLocaleParams {
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
}

/// Composite search filter; empty collections mean "no predicate"
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaceFilter {
    pub class_codes: Vec<String>,
    /// Expand `class_codes` to their whole subtrees
    pub expand_classes: bool,
    pub statuses: Vec<PlaceStatus>,
    pub city_ids: Vec<Uuid>,
    pub distributor_ids: Vec<Uuid>,
    pub verified: Option<bool>,
    /// Substring match against the locale-resolved name/address
    pub query: Option<String>,
    pub center: Option<GeoPoint>,
    /// Radius in meters around `center`
    pub radius_m: Option<f64>,
    /// Keep only places with an interval intersecting this window
    pub open_within: Option<TimeWindow>,
}

/// Sort order for the place search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceSort {
    #[default]
    CreatedAt,
    /// Distance from the filter's center; ignored without one
    Distance,
}

impl PlaceSort {
    /// Parses a sort key; unknown keys are ignored, not errors.
    pub fn from_key(key: &str) -> Option<PlaceSort> {
        match key {
            "created_at" => Some(PlaceSort::CreatedAt),
            "distance" => Some(PlaceSort::Distance),
            _ => None,
        }
    }
}

/// Applies the empty-string clear sentinel to an optional text field.
///
/// `None` keeps the current value, `Some("")` clears it to absent,
/// anything else replaces it.
pub fn apply_clear_sentinel(current: Option<String>, patch: Option<&str>) -> Option<String> {
    match patch {
        None => current,
        Some("") => None,
        Some(value) => Some(value.to_string()),
    }
}

/// Locale-resolved place returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct PlaceView {
    pub id: Uuid,
    pub city_id: Uuid,
    pub distributor_id: Option<Uuid>,
    pub class_code: String,
    pub status: PlaceStatus,
    pub verified: bool,
    pub point: GeoPoint,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub locale: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    /// Meters from the search center, present only for geo searches
    pub distance_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlaceView {
    /// Applies locale resolution (and optional distance) to a place.
    ///
    /// The chosen locale row is used in full; its fields are never
    /// blended with another row's.
    pub fn assemble(
        place: Place,
        requested_locale: &str,
        rows: &[PlaceLocale],
        center: Option<GeoPoint>,
    ) -> Self {
        let (effective, row) = locale::resolve(requested_locale, rows);
        let distance_m = center.map(|c| place.point().distance_m(c));
        Self {
            id: place.id,
            city_id: place.city_id,
            distributor_id: place.distributor_id,
            class_code: place.class_code,
            status: place.status,
            verified: place.verified,
            point: GeoPoint::new(place.lon, place.lat),
            website: place.website,
            phone: place.phone,
            locale: effective.to_string(),
            name: row.map(|r| r.name.clone()),
            address: row.and_then(|r| r.address.clone()),
            description: row.and_then(|r| r.description.clone()),
            distance_m,
            created_at: place.created_at,
            updated_at: place.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_clear_sentinel() {
        let current = Some("https://old.example".to_string());
        assert_eq!(
            apply_clear_sentinel(current.clone(), None),
            Some("https://old.example".to_string())
        );
        assert_eq!(apply_clear_sentinel(current.clone(), Some("")), None);
        assert_eq!(
            apply_clear_sentinel(current, Some("https://new.example")),
            Some("https://new.example".to_string())
        );
        assert_eq!(apply_clear_sentinel(None, Some("")), None);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(PlaceSort::from_key("created_at"), Some(PlaceSort::CreatedAt));
        assert_eq!(PlaceSort::from_key("distance"), Some(PlaceSort::Distance));
        assert_eq!(PlaceSort::from_key("popularity"), None);
    }

    fn place(id: Uuid) -> Place {
        Place {
            id,
            city_id: Uuid::new_v4(),
            distributor_id: None,
            class_code: "food".to_string(),
            status: PlaceStatus::Active,
            verified: false,
            lon: 30.5234,
            lat: 50.4501,
            website: None,
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn locale_row(place_id: Uuid, locale: &str, name: &str, address: Option<&str>) -> PlaceLocale {
        PlaceLocale {
            place_id,
            locale: locale.to_string(),
            name: name.to_string(),
            address: address.map(String::from),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_uses_one_row_in_full() {
        let id = Uuid::new_v4();
        // The uk row has no address; it must not borrow the en one
        let rows = vec![
            locale_row(id, "en", "Coffee Point", Some("1 Main St")),
            locale_row(id, "uk", "Кавовий куток", None),
        ];
        let view = PlaceView::assemble(place(id), "uk", &rows, None);
        assert_eq!(view.locale, "uk");
        assert_eq!(view.name.as_deref(), Some("Кавовий куток"));
        assert!(view.address.is_none());
    }

    #[test]
    fn test_assemble_distance_only_with_center() {
        let id = Uuid::new_v4();
        let rows = vec![locale_row(id, "en", "Coffee Point", None)];

        let without = PlaceView::assemble(place(id), "en", &rows, None);
        assert!(without.distance_m.is_none());

        let center = GeoPoint::new(30.5234, 50.4501);
        let with = PlaceView::assemble(place(id), "en", &rows, Some(center));
        assert!(with.distance_m.unwrap() < 1.0);
    }
}
