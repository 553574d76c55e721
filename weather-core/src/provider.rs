use crate::{Config, WeatherError, WeatherQuery, provider::openweather::OpenWeatherProvider};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Fetches the raw current-weather payload for a city.
///
/// Implementations own their connections; whatever they open is released
/// before `fetch_current` returns, on success and on failure.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_current(&self, query: &WeatherQuery) -> Result<String, WeatherError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn WeatherProvider>, WeatherError> {
    let api_key = config.api_key().ok_or(WeatherError::MissingApiKey)?;
    let provider = OpenWeatherProvider::new(api_key.to_owned(), &config.openweather)?;

    Ok(Box::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();

        assert!(matches!(err, WeatherError::MissingApiKey));
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());

        assert!(provider_from_config(&cfg).is_ok());
    }
}
