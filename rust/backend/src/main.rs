use std::error::Error;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use l2_engine::{
    check_account, check_token, command_to_json, execution_to_json, felt_to_hex, AccountIndex,
    Command, DecodeError, Engine, EngineConfig, EngineError, MemoryNodeStore, StorageError,
    TokenIndex,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<Engine<MemoryNodeStore>>>,
    config: Arc<AppConfig>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    bind_addr: String,
    request_timeout_secs: u64,
    max_body_bytes: usize,
    cors_allow_origins: Vec<String>,
    api_key: Option<String>,
    relayer_account: Option<AccountIndex>,
    nft_bid_token: Option<TokenIndex>,
}

#[derive(Debug, Clone)]
struct AppConfig {
    bind_addr: SocketAddr,
    request_timeout: Duration,
    max_body_bytes: usize,
    cors_allow_origins: Vec<String>,
    api_key: Option<String>,
    relayer_account: AccountIndex,
    nft_bid_token: TokenIndex,
}

#[derive(Debug, thiserror::Error)]
enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct RootResponse {
    root: String,
    executed: u64,
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    payload: String,
    relayer: Option<AccountIndex>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Unauthorized,
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Decode(err) => err.into(),
            EngineError::Storage(StorageError::Address(err)) => {
                ApiError::BadRequest(err.to_string())
            }
            EngineError::Storage(err @ StorageError::UnregisteredPool(_)) => {
                ApiError::BadRequest(err.to_string())
            }
            EngineError::Storage(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::var("L2_BACKEND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let raw = load_config(&config_path)?;
    let config = finalize_config(raw, is_dev_mode())?;
    if config.api_key.is_none() {
        warn!("api_key not set; command submission is unauthenticated");
    }

    let engine = Engine::in_memory(EngineConfig {
        nft_bid_token: config.nft_bid_token,
    })
    .await?;
    let state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        config: Arc::new(config.clone()),
    };
    let app = build_router(state)?;

    info!("l2 backend listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Result<Router, Box<dyn Error>> {
    let config = state.config.clone();
    let cors = build_cors(&config.cors_allow_origins)?;
    let router = Router::new()
        .route("/health", get(health))
        .route("/state/root", get(state_root))
        .route("/commands/decode", post(decode_command))
        .route("/commands", post(submit_command))
        .layer(from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(cors);
    Ok(router)
}

fn load_config(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: RawConfig = toml::from_str(&contents)?;
    Ok(config)
}

fn finalize_config(raw: RawConfig, dev_mode: bool) -> Result<AppConfig, ConfigError> {
    let bind_addr = raw
        .bind_addr
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::Invalid(format!("invalid bind_addr: {e}")))?;
    if raw.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("request_timeout_secs must be >= 1".into()));
    }
    if raw.max_body_bytes == 0 {
        return Err(ConfigError::Invalid("max_body_bytes must be >= 1".into()));
    }
    if raw.cors_allow_origins.is_empty() {
        return Err(ConfigError::Invalid("cors_allow_origins must not be empty".into()));
    }
    let relayer_account = raw.relayer_account.unwrap_or(0);
    check_account(relayer_account)
        .map_err(|e| ConfigError::Invalid(format!("relayer_account: {e}")))?;
    let nft_bid_token = raw.nft_bid_token.unwrap_or(0);
    check_token(nft_bid_token).map_err(|e| ConfigError::Invalid(format!("nft_bid_token: {e}")))?;

    let api_key = raw.api_key.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    });
    if api_key.is_none() && !dev_mode {
        return Err(ConfigError::Invalid(
            "api_key must be set unless ENV=dev or ENV=test".into(),
        ));
    }

    Ok(AppConfig {
        bind_addr,
        request_timeout: Duration::from_secs(raw.request_timeout_secs),
        max_body_bytes: raw.max_body_bytes,
        cors_allow_origins: raw.cors_allow_origins,
        api_key,
        relayer_account,
        nft_bid_token,
    })
}

fn is_dev_mode() -> bool {
    match std::env::var("ENV") {
        Ok(value) => matches!(value.as_str(), "dev" | "test"),
        Err(_) => false,
    }
}

fn build_cors(origins: &[String]) -> Result<CorsLayer, Box<dyn Error>> {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")]);
    if origins.iter().any(|o| o == "*") {
        return Ok(base.allow_origin(Any));
    }
    let mut values = Vec::with_capacity(origins.len());
    for origin in origins {
        values.push(HeaderValue::from_str(origin)?);
    }
    Ok(base.allow_origin(values))
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS || req.uri().path() == "/health" {
        return next.run(req).await;
    }
    if let Some(expected) = state.config.api_key.as_deref() {
        let provided = req
            .headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(req).await
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn state_root(State(state): State<AppState>) -> Json<RootResponse> {
    let engine = state.engine.lock().await;
    Json(RootResponse {
        root: felt_to_hex(engine.root()),
        executed: engine.executed(),
    })
}

async fn decode_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Value>, ApiError> {
    let relayer = request.relayer.unwrap_or(state.config.relayer_account);
    let command = Command::decode_hex(&request.payload, relayer)?;
    Ok(Json(command_to_json(&command)))
}

async fn submit_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Value>, ApiError> {
    let relayer = request.relayer.unwrap_or(state.config.relayer_account);
    let command = Command::decode_hex(&request.payload, relayer)?;
    // Held across execution: witnesses are only valid against the pre-state they were taken from.
    let mut engine = state.engine.lock().await;
    let paths = engine.execute(&command).await.map_err(|err| {
        error!(op = command.op().name(), "command failed: {err}");
        ApiError::from(err)
    })?;
    Ok(Json(execution_to_json(&command, &paths)))
}
