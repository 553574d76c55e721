use tracing::{info, warn};

use crate::{
    Config, WeatherError, WeatherQuery, WeatherReport,
    config::ConditionField,
    provider::{WeatherProvider, openweather::parse_report, provider_from_config},
};

/// The single request/transform/response pipeline: city in, report out.
///
/// Holds no per-request state, so one instance can serve any number of
/// concurrent lookups.
#[derive(Debug)]
pub struct WeatherLookup {
    provider: Box<dyn WeatherProvider>,
    condition_field: ConditionField,
}

impl WeatherLookup {
    pub fn new(provider: Box<dyn WeatherProvider>, condition_field: ConditionField) -> Self {
        Self { provider, condition_field }
    }

    pub fn from_config(config: &Config) -> Result<Self, WeatherError> {
        let provider = provider_from_config(config)?;
        Ok(Self::new(provider, config.openweather.condition_field))
    }

    pub async fn handle(&self, city: Option<&str>) -> Result<WeatherReport, WeatherError> {
        let query = WeatherQuery::new(city)?;

        let result = match self.provider.fetch_current(&query).await {
            Ok(body) => parse_report(query.city.clone(), body, self.condition_field),
            Err(err) => Err(err),
        };

        match &result {
            Ok(report) => info!(
                city = %report.city,
                temperature = report.temperature_celsius,
                condition = %report.weather_condition,
                "weather lookup succeeded"
            ),
            Err(err) => warn!(city = %query.city, error = %err, "weather lookup failed"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    const BODY: &str = r#"{"weather":["Rain"],"main":{"temp":285.5,"humidity":70},"wind":{"speed":6.2},"dt":1600000000}"#;

    #[derive(Debug)]
    struct FixedProvider {
        body: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WeatherProvider for FixedProvider {
        async fn fetch_current(&self, _query: &WeatherQuery) -> Result<String, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.body {
                Some(body) => Ok(body.to_string()),
                None => Err(WeatherError::UpstreamTimeout(10)),
            }
        }
    }

    fn lookup(body: Option<&'static str>) -> (WeatherLookup, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FixedProvider { body, calls: calls.clone() };
        (WeatherLookup::new(Box::new(provider), ConditionField::Scalar), calls)
    }

    #[tokio::test]
    async fn empty_city_never_reaches_upstream() {
        let (lookup, calls) = lookup(Some(BODY));

        assert!(matches!(lookup.handle(None).await, Err(WeatherError::Input)));
        assert!(matches!(lookup.handle(Some("")).await, Err(WeatherError::Input)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn builds_report_from_fixture() {
        let (lookup, calls) = lookup(Some(BODY));

        let report = lookup.handle(Some("Bergen")).await.expect("report");

        assert_eq!(report.city, "Bergen");
        assert_eq!(report.observed_at.timestamp_millis(), 1_600_000_000_000);
        assert_eq!(report.temperature_celsius, 12);
        assert_eq!(report.weather_condition, "Rain");
        assert_eq!(report.humidity, 70);
        assert_eq!(report.wind_speed_mps, 6.2);
        assert_eq!(report.raw_payload, BODY);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_lookups_are_identical() {
        let (lookup, _) = lookup(Some(BODY));

        let first = lookup.handle(Some("Bergen")).await.expect("first");
        let second = lookup.handle(Some("Bergen")).await.expect("second");

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("json"),
            serde_json::to_string(&second).expect("json")
        );
    }

    #[tokio::test]
    async fn upstream_errors_propagate_unchanged() {
        let (lookup, _) = lookup(None);

        let err = lookup.handle(Some("Bergen")).await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamTimeout(10)));
    }

    #[tokio::test]
    async fn malformed_body_yields_parse_error() {
        let (lookup, _) = lookup(Some(r#"{"weather":["Rain"],"dt":1"#));

        let err = lookup.handle(Some("Bergen")).await.unwrap_err();
        assert!(matches!(err, WeatherError::Parse(_)));
    }

    #[test]
    fn from_config_requires_api_key() {
        let err = WeatherLookup::from_config(&Config::default()).unwrap_err();
        assert!(matches!(err, WeatherError::MissingApiKey));
    }
}
