use async_trait::async_trait;
use serde::Deserialize;

use crate::core::config::GeocodingConfig;
use crate::core::error::{AppError, Result};
use crate::features::places::models::GeoPoint;

/// Reverse-geocoding collaborator used to fill in missing addresses.
///
/// Any transport or remote failure is surfaced as an error; callers
/// decide whether a lookup is optional.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn guess_address(&self, point: GeoPoint) -> Result<String>;
}

/// Nominatim reverse API response structure
#[derive(Debug, Deserialize)]
pub struct NominatimReverseResponse {
    pub display_name: Option<String>,
    /// Nominatim reports "unable to geocode" in-band
    pub error: Option<String>,
}

/// Reverse geocoding against a Nominatim endpoint
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .build()
                .expect("Failed to build HTTP client"),
            base_url: config.base_url.clone(),
        }
    }

    fn reverse_url(&self, point: GeoPoint) -> String {
        format!(
            "{}/reverse?lat={}&lon={}&format=json&zoom=18",
            self.base_url, point.lat, point.lon
        )
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn guess_address(&self, point: GeoPoint) -> Result<String> {
        let url = self.reverse_url(point);
        tracing::debug!("Reverse geocoding ({}, {}) -> {}", point.lat, point.lon, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!("Nominatim request failed: {:?}", e);
            AppError::ExternalServiceError(format!("Nominatim request failed: {}", e))
        })?;

        if !response.status().is_success() {
            tracing::warn!("Nominatim returned status: {}", response.status());
            return Err(AppError::ExternalServiceError(format!(
                "Nominatim returned status {}",
                response.status()
            )));
        }

        let body: NominatimReverseResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Nominatim response: {:?}", e);
            AppError::ExternalServiceError(format!("Failed to parse Nominatim response: {}", e))
        })?;

        if let Some(error) = body.error {
            return Err(AppError::ExternalServiceError(format!(
                "Nominatim could not resolve ({}, {}): {}",
                point.lat, point.lon, error
            )));
        }

        body.display_name.ok_or_else(|| {
            AppError::ExternalServiceError(format!(
                "Nominatim returned no address for ({}, {})",
                point.lat, point.lon
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geocoder() -> NominatimGeocoder {
        NominatimGeocoder::new(&GeocodingConfig {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "PlacedirCore/0.1 (test)".to_string(),
        })
    }

    #[test]
    fn test_reverse_url_format() {
        let url = geocoder().reverse_url(GeoPoint::new(30.5234, 50.4501));
        assert_eq!(
            url,
            "https://nominatim.openstreetmap.org/reverse?lat=50.4501&lon=30.5234&format=json&zoom=18"
        );
    }

    #[test]
    fn test_reverse_response_parsing() {
        let ok: NominatimReverseResponse =
            serde_json::from_str(r#"{"display_name": "1 Khreshchatyk St, Kyiv"}"#).unwrap();
        assert_eq!(ok.display_name.as_deref(), Some("1 Khreshchatyk St, Kyiv"));
        assert!(ok.error.is_none());

        let err: NominatimReverseResponse =
            serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert!(err.display_name.is_none());
        assert_eq!(err.error.as_deref(), Some("Unable to geocode"));
    }
}
