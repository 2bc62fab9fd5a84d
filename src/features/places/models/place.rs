use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::shared::locale::Localized;

/// Earth's radius in meters (for Haversine formula)
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Place status enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "place_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlaceStatus {
    Active,
    Inactive,
    Blocked,
}

impl std::fmt::Display for PlaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceStatus::Active => write!(f, "active"),
            PlaceStatus::Inactive => write!(f, "inactive"),
            PlaceStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// Geographic point, WGS84 lon/lat degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn validate(&self) -> Result<()> {
        if !(-180.0..=180.0).contains(&self.lon) || !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::Validation(format!(
                "Point ({}, {}) is outside lon [-180, 180] / lat [-90, 90]",
                self.lon, self.lat
            )));
        }
        Ok(())
    }

    /// Haversine distance to another point in meters
    pub fn distance_m(&self, other: GeoPoint) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_METERS * c
    }
}

/// Database model for a place
#[derive(Debug, Clone, FromRow)]
pub struct Place {
    pub id: Uuid,
    pub city_id: Uuid,
    pub distributor_id: Option<Uuid>,
    pub class_code: String,
    pub status: PlaceStatus,
    pub verified: bool,
    pub lon: f64,
    pub lat: f64,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat)
    }
}

/// Database model for per-locale place content
#[derive(Debug, Clone, FromRow)]
pub struct PlaceLocale {
    pub place_id: Uuid,
    pub locale: String,
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Localized for PlaceLocale {
    fn locale(&self) -> &str {
        &self.locale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_known_cities() {
        // Kyiv to Lviv, approx 470 km great-circle
        let kyiv = GeoPoint::new(30.5234, 50.4501);
        let lviv = GeoPoint::new(24.0297, 49.8397);

        let distance = kyiv.distance_m(lviv);
        assert!(distance > 455_000.0 && distance < 480_000.0);
    }

    #[test]
    fn test_distance_same_point() {
        let p = GeoPoint::new(30.5234, 50.4501);
        assert!(p.distance_m(p) < 1.0);
    }

    #[test]
    fn test_point_validation() {
        assert!(GeoPoint::new(30.5, 50.4).validate().is_ok());
        assert!(GeoPoint::new(190.0, 50.4).validate().is_err());
        assert!(GeoPoint::new(30.5, -95.0).validate().is_err());
    }
}
