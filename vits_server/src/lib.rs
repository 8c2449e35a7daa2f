pub mod config;
pub mod error;
pub mod validation;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use vits_core::{TtsService, SOUND_URL_PREFIX};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::validation::validate_tts_request;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TtsService>,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(service: TtsService, config: ServerConfig) -> Self {
        Self {
            service: Arc::new(service),
            request_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }
}

#[derive(Deserialize)]
pub struct TtsRequest {
    text: String,
    model_name: String,
    speaker: Option<String>,
    language: Option<String>,
    speed: Option<f32>,
}

#[derive(Serialize)]
pub struct TtsResponse {
    file: String,
}

#[derive(Serialize)]
pub struct ModelList {
    models: Vec<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub request_count: u64,
    pub loaded_models: usize,
    pub loads: u64,
    pub stale_checks: u64,
    pub reloads: u64,
}

/// Build the application router with its middleware stack.
pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let config = &state.config;
    let cors = cors_layer(config.cors_allowed_origins.as_deref());

    // Global limit: all clients share one bucket, refilled once per second
    let per_minute = config.rate_limit_per_minute.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(u64::from((per_minute / 60).max(1)))
            .burst_size(per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit: {per_minute}/min"))?,
    );
    info!("Rate limiting: {} requests per minute", per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors)
        .into_inner();

    let api = Router::new()
        .route("/list", get(list_models))
        .route("/tts", post(tts_endpoint))
        .route("/stats", get(stats_endpoint));

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .nest_service(SOUND_URL_PREFIX, ServeDir::new(state.service.sound_dir()))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state);

    Ok(app)
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let Some(allowed_origins) = allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        return layer.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        layer.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

// Tag every request and response with an id for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    request
        .headers_mut()
        .insert("x-request-id", request_id.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", request_id);
    response
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelList>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    // Re-reads the manifest file
    let service = Arc::clone(&state.service);
    let models = tokio::task::spawn_blocking(move || service.list_models())
        .await
        .map_err(|e| ApiError::InternalError(format!("list task failed: {e}")))?;
    Ok(Json(ModelList { models }))
}

pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let (language, speed) = validate_tts_request(
        &req.model_name,
        req.language.as_deref(),
        req.speed,
        state.config.default_language,
    )?;

    // Hashing, loading and inference all block
    let service = Arc::clone(&state.service);
    let sound = tokio::task::spawn_blocking(move || {
        service.synthesize(
            &req.text,
            &req.model_name,
            req.speaker.as_deref(),
            language,
            speed,
        )
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("synthesis task failed: {e}")))??;

    info!(
        "Generated {} ({} ms at {} Hz)",
        sound.file_name, sound.duration_ms, sound.sample_rate
    );
    Ok(Json(TtsResponse { file: sound.url }))
}

pub async fn stats_endpoint(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.service.cache();
    let stats = cache.stats();
    Json(StatsResponse {
        request_count: state.request_count.load(Ordering::Relaxed),
        loaded_models: cache.len(),
        loads: stats.loads,
        stale_checks: stats.stale_checks,
        reloads: stats.reloads,
    })
}
