use crate::{
    Config,
    error::WeatherError,
    model::{
        AirQuality, Coordinates, CurrentConditions, Forecast, LocationQuery, PlaceSuggestion, Units,
    },
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Number of candidates returned by place autocomplete.
pub const SUGGESTION_LIMIT: usize = 5;

/// Source of weather data. Each call is a single attempt; callers decide what
/// a failure means for them.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(
        &self,
        query: &LocationQuery,
        units: Units,
    ) -> Result<CurrentConditions, WeatherError>;

    async fn forecast(&self, coords: Coordinates, units: Units) -> Result<Forecast, WeatherError>;

    async fn air_quality(&self, coords: Coordinates) -> Result<AirQuality, WeatherError>;

    async fn suggest_places(&self, text: &str) -> Result<Vec<PlaceSuggestion>, WeatherError>;
}

/// Construct the provider described by `config`.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
                 Hint: run `weatherdash configure` or set OPENWEATHER_API_KEY."
        )
    })?;

    let provider = match config.base_url.as_deref() {
        Some(base) => OpenWeatherProvider::with_base_url(api_key.to_owned(), base),
        None => OpenWeatherProvider::new(api_key.to_owned()),
    };

    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No API key configured"));
        assert!(msg.contains("Hint: run `weatherdash configure`"));
    }

    #[test]
    fn provider_from_config_works_when_key_is_set() {
        let cfg = Config {
            api_key: Some("KEY".to_string()),
            ..Config::default()
        };

        assert!(provider_from_config(&cfg).is_ok());
    }
}
