use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong between receiving a city and producing a report.
///
/// None of these are recovered from inside the crate: each one ends the lookup
/// and is handed back to the caller as-is.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Missing or empty 'city' parameter")]
    Input,

    #[error("No API key configured for OpenWeather.\nHint: run `weather configure` or set OPENWEATHER_API_KEY.")]
    MissingApiKey,

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Could not build the OpenWeather request URL")]
    InvalidUrl(#[source] reqwest::Error),

    #[error("Failed to send request to OpenWeather")]
    UpstreamConnection(#[source] reqwest::Error),

    #[error("OpenWeather did not answer within {0} seconds")]
    UpstreamTimeout(u64),

    #[error("OpenWeather request failed with status {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("Failed to read OpenWeather response body")]
    UpstreamRead(#[source] reqwest::Error),

    #[error("Failed to parse OpenWeather JSON: {0}")]
    Parse(String),

    #[error("Unexpected shape of 'weather[0]': {0}")]
    SchemaMismatch(String),
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        WeatherError::Parse(err.to_string())
    }
}
