//! HTTP surface: the streaming `/websearch` endpoint and a health check.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{load_system_prompt, ServiceConfig};
use crate::errors::{DeepSearchError, Result};
use crate::pipeline::PipelineOrchestrator;
use crate::providers::{BingSearchClient, OpenAiClient};
use crate::websearch::{ConcurrentRetriever, HttpPageFetcher};

/// Body of a `/websearch` request.
#[derive(Debug, Deserialize)]
pub struct WebSearchRequest {
    /// Natural-language query.
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<PipelineOrchestrator>,
}

/// Wires the production clients from `config`.
///
/// Reads the system prompt file once.
///
/// # Errors
///
/// [`DeepSearchError::Config`] if an HTTP client cannot be built or the
/// prompt file cannot be read.
pub fn build_pipeline(config: &ServiceConfig) -> Result<PipelineOrchestrator> {
    let system_prompt = load_system_prompt(&config.system_prompt_path)?;
    let api_client = reqwest::Client::builder()
        .build()
        .map_err(|e| DeepSearchError::Config(format!("cannot build HTTP client: {e}")))?;

    let search = BingSearchClient::new(api_client.clone(), config.bing.clone());
    let completion = OpenAiClient::new(api_client, config.openai.clone());
    let fetcher = HttpPageFetcher::new(&config.fetch)?;
    let retriever = ConcurrentRetriever::new(Arc::new(fetcher), config.fetch.clone());

    Ok(PipelineOrchestrator::new(
        Arc::new(search),
        Arc::new(completion),
        retriever,
        system_prompt,
    )
    .with_market(config.market.clone())
    .with_timeouts(config.timeouts.clone())
    .with_run_config(config.run.clone()))
}

/// Builds the application router.
pub fn router(pipeline: Arc<PipelineOrchestrator>, cors: bool) -> Router {
    let app = Router::new()
        .route("/websearch", post(websearch_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { pipeline })
        .layer(TraceLayer::new_for_http());
    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

async fn websearch_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<WebSearchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed request body");
            return bad_request(&rejection.body_text());
        }
    };
    let Some(query) = request.query.filter(|q| !q.trim().is_empty()) else {
        return bad_request("query must be a non-empty string");
    };

    info!(query = %query, "Starting web search stream");
    let (rx, _handle) = state.pipeline.spawn(query);

    let body = UnboundedReceiverStream::new(rx).filter_map(|event| async move {
        match event.to_line() {
            Ok(line) => Some(Ok::<_, Infallible>(Bytes::from(line))),
            Err(e) => {
                warn!(error = %e, event_type = event.tag(), "Dropping unserializable event");
                None
            }
        }
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
