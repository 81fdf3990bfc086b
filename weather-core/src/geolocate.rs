//! One-shot position lookup used when the session starts without a city.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::{Config, error::GeolocationError, model::Coordinates};

pub const IP_LOOKUP_URL: &str = "http://ip-api.com/json/";

#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn locate(&self) -> Result<Coordinates, GeolocationError>;
}

/// Reports a position fixed ahead of time, or "unsupported" when there is none.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation(pub Option<Coordinates>);

#[async_trait]
impl Geolocator for FixedLocation {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        self.0.ok_or(GeolocationError::Unsupported)
    }
}

/// The user has switched location lookup off.
#[derive(Debug, Clone, Default)]
pub struct DisabledGeolocation;

#[async_trait]
impl Geolocator for DisabledGeolocation {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::PermissionDenied)
    }
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    url: String,
    http: Client,
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::with_url(IP_LOOKUP_URL)
    }
}

impl IpGeolocator {
    pub fn with_url(url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            url: url.to_string(),
            http,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpLookup {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        let unavailable = |reason: String| GeolocationError::Unavailable(reason);

        let res = self
            .http
            .get(&self.url)
            .query(&[("fields", "status,message,lat,lon")])
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let lookup: IpLookup = res.json().await.map_err(|e| unavailable(e.to_string()))?;

        match (lookup.status.as_str(), lookup.lat, lookup.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(unavailable(
                lookup.message.unwrap_or_else(|| "lookup failed".to_string()),
            )),
        }
    }
}

/// Pick the position source described by `config`.
pub fn geolocator_from_config(config: &Config) -> Arc<dyn Geolocator> {
    match (config.home, config.ip_geolocation) {
        (Some(home), _) => Arc::new(FixedLocation(Some(home))),
        (None, true) => Arc::new(IpGeolocator::default()),
        (None, false) => Arc::new(DisabledGeolocation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_location_reports_configured_position() {
        let here = Coordinates::new(51.5, -0.12);
        assert_eq!(FixedLocation(Some(here)).locate().await, Ok(here));
        assert_eq!(
            FixedLocation(None).locate().await,
            Err(GeolocationError::Unsupported)
        );
    }

    #[tokio::test]
    async fn disabled_lookup_is_a_denial() {
        assert_eq!(
            DisabledGeolocation.locate().await,
            Err(GeolocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn home_in_config_wins_over_ip_lookup() {
        let cfg = Config {
            home: Some(Coordinates::new(1.0, 2.0)),
            ..Config::default()
        };
        let locator = geolocator_from_config(&cfg);
        assert_eq!(locator.locate().await, Ok(Coordinates::new(1.0, 2.0)));

        let cfg = Config {
            ip_geolocation: false,
            ..Config::default()
        };
        assert_eq!(
            geolocator_from_config(&cfg).locate().await,
            Err(GeolocationError::PermissionDenied)
        );
    }
}
