use crate::search::{EngineError, FaqEngine, SearchResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    engine: Arc<FaqEngine>,
}

pub fn router(engine: Arc<FaqEngine>) -> Router {
    let shared_state = Arc::new(SharedState { engine });

    Router::new()
        .route("/api/search", post(search))
        .route("/api/suggestions", post(suggestions))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app(engine: Arc<FaqEngine>, bind: &str) -> anyhow::Result<()> {
    let app = router(engine);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("listening on {bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(engine: Arc<FaqEngine>, bind: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(engine, bind).await })
}

#[derive(Debug, thiserror::Error)]
enum HttpError {
    #[error("Invalid request")]
    InvalidRequest,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("search task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self {
            HttpError::InvalidRequest => (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"error": self.to_string()})),
            ),
            HttpError::Engine(_) | HttpError::Join(_) => {
                log::error!("{self:?}");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": self.to_string()})),
                )
            }
        }
        .into_response()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub query: Option<String>,
    /// Falls back to the configured default when absent
    pub top_k: Option<usize>,
}

impl QueryRequest {
    fn from_payload(payload: Result<Json<Self>, JsonRejection>) -> Result<Self, HttpError> {
        match payload {
            Ok(Json(request)) if request.query.is_some() => Ok(request),
            Ok(_) => Err(HttpError::InvalidRequest),
            Err(rejection) => {
                log::debug!("rejected payload: {rejection}");
                Err(HttpError::InvalidRequest)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, HttpError> {
    let request = QueryRequest::from_payload(payload)?;
    log::debug!("payload: {request:?}");

    let engine = state.engine.clone();
    let query = request.query.unwrap_or_default();
    let top_k = request.top_k.unwrap_or_else(|| engine.default_top_k());

    // query embedding is CPU-bound
    let results =
        tokio::task::spawn_blocking(move || engine.search(&query, top_k)).await??;

    Ok(Json(SearchResponse { results }))
}

async fn suggestions(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Vec<String>>, HttpError> {
    let request = QueryRequest::from_payload(payload)?;
    log::debug!("payload: {request:?}");

    let query = request.query.unwrap_or_default();

    Ok(Json(state.engine.suggestions(&query)))
}
