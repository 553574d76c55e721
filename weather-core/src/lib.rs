//! Core library for the weather lookup service.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather upstream and the extraction of report fields
//! - Shared domain models (query, report, handoff attributes)
//! - The lookup pipeline tying them together
//!
//! It is used by `weather-server`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod provider;

pub use config::{ConditionField, Config, OpenWeatherConfig, ServerConfig};
pub use error::WeatherError;
pub use handler::WeatherLookup;
pub use model::{ReportAttributes, WeatherQuery, WeatherReport};
pub use provider::{WeatherProvider, provider_from_config};
