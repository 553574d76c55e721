use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::WeatherError;

const KELVIN_OFFSET: f64 = 273.15;

/// A caller-supplied city, not yet sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub city: String,
}

impl WeatherQuery {
    /// Only emptiness is checked; the content is passed on untouched.
    pub fn new(city: Option<&str>) -> Result<Self, WeatherError> {
        match city {
            Some(city) if !city.is_empty() => Ok(Self { city: city.to_string() }),
            _ => Err(WeatherError::Input),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub observed_at: DateTime<Utc>,
    pub city: String,
    pub temperature_celsius: i32,
    pub weather_condition: String,
    pub humidity: i32,
    pub wind_speed_mps: f64,
    pub raw_payload: String,
}

impl WeatherReport {
    /// Named attributes handed to whatever renders the report.
    pub fn attributes(&self) -> ReportAttributes<'_> {
        ReportAttributes {
            date: format_date(self.observed_at),
            city: &self.city,
            temperature: self.temperature_celsius,
            weather_condition: &self.weather_condition,
            humidity: self.humidity,
            wind_speed: self.wind_speed_mps,
            weather_data: &self.raw_payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAttributes<'a> {
    pub date: String,
    pub city: &'a str,
    pub temperature: i32,
    pub weather_condition: &'a str,
    pub humidity: i32,
    pub wind_speed: f64,
    pub weather_data: &'a str,
}

/// Kelvin to whole degrees Celsius, truncated toward zero (-1.15 becomes -1).
pub fn kelvin_to_celsius(kelvin: f64) -> i32 {
    (kelvin - KELVIN_OFFSET) as i32
}

/// Upstream `dt` is in seconds; it is scaled to milliseconds before conversion.
pub fn observed_at_from_dt(dt: i64) -> Option<DateTime<Utc>> {
    dt.checked_mul(1000).and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Same layout as `java.util.Date#toString`, pinned to UTC: `Tue Nov 14 22:13:20 UTC 2023`.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%a %b %d %H:%M:%S UTC %Y").to_string()
}
