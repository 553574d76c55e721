//! HTTP front end: one route that looks up the weather on POST and
//! acknowledges on GET.

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{
        Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::{error::Error as _, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use weather_core::{Config, WeatherError, WeatherLookup};

#[derive(Debug, Clone)]
struct AppState {
    lookup: Arc<WeatherLookup>,
    context_path: Arc<str>,
}

/// Decoded `key=value` pairs in arrival order; repeated keys are kept.
type Params = Vec<(String, String)>;

/// First `city` wins, like servlet `getParameter`.
fn first_city(params: Params) -> Option<String> {
    params
        .into_iter()
        .find_map(|(key, value)| (key == "city").then_some(value))
}

/// A lookup failure on its way to the client.
#[derive(Debug)]
struct ApiError(WeatherError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WeatherError::Input => StatusCode::BAD_REQUEST,
            WeatherError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WeatherError::MissingApiKey | WeatherError::HttpClient(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_GATEWAY,
        };

        (status, Json(json!({ "error": error_chain(&self.0) }))).into_response()
    }
}

fn error_chain(err: &WeatherError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Mount point with one leading slash and no trailing one; "/" means root.
fn normalize_context_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub fn router(lookup: Arc<WeatherLookup>, context_path: &str) -> Router {
    let context_path = normalize_context_path(context_path);

    let routes = Router::new()
        .route("/weather", get(acknowledge).post(lookup_weather))
        .with_state(AppState {
            lookup,
            context_path: Arc::from(context_path.as_str()),
        });

    let app = if context_path.is_empty() {
        routes
    } else {
        Router::new().nest(&context_path, routes)
    };

    app.layer(TraceLayer::new_for_http())
}

async fn acknowledge(State(state): State<AppState>) -> String {
    format!("Served at: {}", state.context_path)
}

/// Query string wins over the form body when both carry `city`.
async fn lookup_weather(
    State(state): State<AppState>,
    query: Result<Query<Params>, QueryRejection>,
    form: Result<Form<Params>, FormRejection>,
) -> Response {
    let city = query
        .ok()
        .and_then(|Query(params)| first_city(params))
        .or_else(|| form.ok().and_then(|Form(params)| first_city(params)));

    match state.lookup.handle(city.as_deref()).await {
        Ok(report) => Json(report.attributes()).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

pub async fn serve(config: &Config, bind: &str) -> anyhow::Result<()> {
    let lookup = Arc::new(WeatherLookup::from_config(config)?);
    let app = router(lookup, &config.server.context_path);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "weather server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("weather server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
}
