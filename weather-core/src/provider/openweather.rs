use async_trait::async_trait;
use reqwest::{Client, Request};
use serde::{Deserialize, Deserializer, de};
use serde_json::{Number, Value};
use tracing::debug;

use crate::{
    config::{ConditionField, OpenWeatherConfig},
    error::WeatherError,
    model::{WeatherQuery, WeatherReport, kelvin_to_celsius, observed_at_from_dt},
};

use super::WeatherProvider;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    encode_city: bool,
    timeout_secs: u64,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, settings: &OpenWeatherConfig) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(WeatherError::HttpClient)?;

        Ok(Self {
            api_key,
            base_url: settings.base_url.clone(),
            encode_city: settings.encode_city,
            timeout_secs: settings.timeout_secs,
            http,
        })
    }

    fn build_request(&self, city: &str) -> Result<Request, WeatherError> {
        let builder = if self.encode_city {
            self.http
                .get(&self.base_url)
                .query(&[("q", city), ("appid", self.api_key.as_str())])
        } else {
            // City goes into the URL as typed; '&' or '#' in it change the query.
            let url = format!("{}?q={}&appid={}", self.base_url, city, self.api_key);
            self.http.get(url)
        };

        builder.build().map_err(WeatherError::InvalidUrl)
    }

    fn classify(&self, err: reqwest::Error, reading_body: bool) -> WeatherError {
        if err.is_timeout() {
            WeatherError::UpstreamTimeout(self.timeout_secs)
        } else if reading_body {
            WeatherError::UpstreamRead(err)
        } else {
            WeatherError::UpstreamConnection(err)
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch_current(&self, query: &WeatherQuery) -> Result<String, WeatherError> {
        let request = self.build_request(&query.city)?;
        debug!(city = %query.city, encoded = self.encode_city, "requesting current weather");

        let res = self
            .http
            .execute(request)
            .await
            .map_err(|e| self.classify(e, false))?;

        let status = res.status();
        // `text` consumes the response, so the connection is handed back either way.
        let body = res.text().await.map_err(|e| self.classify(e, true))?;
        debug!(%status, bytes = body.len(), "OpenWeather responded");

        if !status.is_success() {
            return Err(WeatherError::UpstreamStatus {
                status,
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(deserialize_with = "truncated_i32")]
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(deserialize_with = "truncated_i64")]
    dt: i64,
    main: OwMain,
    wind: OwWind,
    // Entries are kept untyped so the condition selection can be swapped.
    weather: Vec<Value>,
}

/// Integers may arrive as `81.0` or `1.7e9`; the fraction is dropped.
fn whole_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
            .map(|f| f.trunc() as i64)
    })
}

fn truncated_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let n = Number::deserialize(deserializer)?;
    whole_number(&n).ok_or_else(|| de::Error::custom(format!("integer out of range: {n}")))
}

fn truncated_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let n = truncated_i64(deserializer)?;
    i32::try_from(n).map_err(|_| de::Error::custom(format!("integer out of range: {n}")))
}

/// Turn a current-weather body into a report. Either every field is present
/// and well-typed or nothing is returned.
pub fn parse_report(
    city: String,
    body: String,
    condition: ConditionField,
) -> Result<WeatherReport, WeatherError> {
    let parsed: OwCurrentResponse = serde_json::from_str(&body)?;

    let observed_at = observed_at_from_dt(parsed.dt)
        .ok_or_else(|| WeatherError::Parse(format!("'dt' out of range: {}", parsed.dt)))?;
    let weather_condition = extract_condition(&parsed.weather, condition)?;

    Ok(WeatherReport {
        observed_at,
        city,
        temperature_celsius: kelvin_to_celsius(parsed.main.temp),
        weather_condition,
        humidity: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        raw_payload: body,
    })
}

/// Pick the condition text out of the first `weather` entry.
///
/// `Scalar` expects the entry itself to be a primitive. OpenWeather actually sends
/// objects like `{"main": "Clouds", "description": "broken clouds"}`, which only
/// `Main` and `Description` accept. Numbers and booleans are taken as their
/// JSON text (`800`, `true`); null, arrays and objects are rejected.
pub fn extract_condition(weather: &[Value], field: ConditionField) -> Result<String, WeatherError> {
    let first = weather
        .first()
        .ok_or_else(|| WeatherError::SchemaMismatch("'weather' array is empty".to_string()))?;

    let (label, value) = match field {
        ConditionField::Scalar => ("weather[0]", Some(first)),
        ConditionField::Main => ("weather[0].main", first.get("main")),
        ConditionField::Description => ("weather[0].description", first.get("description")),
    };

    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(WeatherError::SchemaMismatch(format!(
            "expected {label} to be a string, found {}",
            json_kind(other)
        ))),
        None => Err(WeatherError::SchemaMismatch(format!(
            "{label} is missing (weather[0] is {})",
            json_kind(first)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
