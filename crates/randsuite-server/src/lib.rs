//! HTTP API for the randsuite battery.
//!
//! Accepts a raw input plus a test selection as JSON, normalizes it, runs the
//! selected tests on a blocking worker, and returns the ordered result set.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use randsuite_core::{
    DEFAULT_CHUNK_WIDTH, DEFAULT_INTEGER_WIDTH, NormalizeOptions, Overrides, RawInput,
    normalize_with,
};
use randsuite_tests::{Registry, ResultSet, TestSpec};

/// Shared server state.
struct AppState {
    registry: Registry,
    threads: Option<usize>,
}

/// Body of `POST /api/v1/run`. Exactly one input field must be set.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    pub bits: Option<String>,
    /// Free text: literal bits if it is all 0/1, otherwise its UTF-8 bytes.
    pub text: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub integers: Option<Vec<u64>>,
    #[serde(default = "default_tests")]
    pub tests: Vec<String>,
    #[serde(default)]
    pub overrides: Overrides,
    pub chunk_width: Option<u32>,
    pub integer_width: Option<u32>,
}

fn default_tests() -> Vec<String> {
    vec!["all".to_string()]
}

impl RunRequest {
    fn raw_input(&self) -> Result<RawInput, ApiError> {
        let mut inputs = Vec::new();
        if let Some(bits) = &self.bits {
            inputs.push(RawInput::BitString(bits.clone()));
        }
        if let Some(text) = &self.text {
            inputs.push(RawInput::BitString(text.clone()));
        }
        if let Some(bytes) = &self.bytes {
            inputs.push(RawInput::ByteBuffer(bytes.clone()));
        }
        if let Some(integers) = &self.integers {
            inputs.push(RawInput::IntegerList(integers.clone()));
        }
        match inputs.len() {
            1 => Ok(inputs.remove(0)),
            0 => Err(ApiError::bad_request(
                "one of bits, text, bytes, or integers is required",
            )),
            _ => Err(ApiError::bad_request(
                "only one of bits, text, bytes, or integers may be given",
            )),
        }
    }

    fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            chunk_width: self.chunk_width.unwrap_or(DEFAULT_CHUNK_WIDTH),
            integer_width: self.integer_width.unwrap_or(DEFAULT_INTEGER_WIDTH),
        }
    }
}

#[derive(Serialize)]
struct RunResponse {
    input_bits: usize,
    padded_bits: usize,
    passed: usize,
    untestable: usize,
    quality_score: f64,
    #[serde(flatten)]
    results: ResultSet,
}

#[derive(Serialize)]
struct TestsResponse {
    tests: &'static [TestSpec],
    total: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    tests: usize,
}

/// Error body: `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<randsuite_core::Error> for ApiError {
    fn from(err: randsuite_core::Error) -> Self {
        match err {
            randsuite_core::Error::Io(_) => Self::internal(err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// Normalize and run one request. Blocking; call off the async runtime.
fn execute(
    registry: Registry,
    request: RunRequest,
    threads: Option<usize>,
) -> Result<RunResponse, ApiError> {
    let raw = request.raw_input()?;
    let stream = normalize_with(&raw, &request.options())?;
    let ids = registry.select(&request.tests)?;
    let results = registry.run_with(&stream, &ids, &request.overrides, threads)?;
    Ok(RunResponse {
        input_bits: stream.input_bits(),
        padded_bits: stream.bits().len(),
        passed: results.passed(),
        untestable: results.untestable(),
        quality_score: results.quality_score(),
        results,
    })
}

async fn handle_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let registry = state.registry;
    let threads = state.threads;
    let response = tokio::task::spawn_blocking(move || execute(registry, request, threads))
        .await
        .map_err(|e| {
            log::error!("test batch worker failed: {e}");
            ApiError::internal("test batch worker failed")
        })??;
    Ok(Json(response))
}

async fn handle_tests(State(state): State<Arc<AppState>>) -> Json<TestsResponse> {
    let tests = state.registry.tests();
    Json(TestsResponse {
        tests,
        total: tests.len(),
    })
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: randsuite_core::VERSION,
        tests: state.registry.tests().len(),
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let keys: Vec<&str> = state.registry.tests().iter().map(|t| t.key).collect();

    Json(serde_json::json!({
        "name": "randsuite server",
        "version": randsuite_core::VERSION,
        "tests": keys.len(),
        "endpoints": {
            "/": "This API index",
            "/health": "Health check",
            "/api/v1/tests": "List every test with its id, suite, family, and default parameters",
            "/api/v1/run": {
                "method": "POST",
                "description": "Normalize an input and run a selection of tests",
                "body": {
                    "bits | text | bytes | integers": "Exactly one input",
                    "tests": "Selectors: ids, keys, or all / diehard / testu01 (default: all)",
                    "overrides": "Per-test parameter overrides, e.g. {\"gap\": {\"max_gap\": 6}}",
                    "chunk_width": "Padding width in bits (1-64, default: 32)",
                    "integer_width": "Bits per integer for integer input (1-64, default: 8)",
                }
            },
        },
        "available_tests": keys.join(", "),
    }))
}

/// Build the axum router. `threads` caps the worker pool per request.
pub fn build_router(threads: Option<usize>) -> Router {
    let state = Arc::new(AppState {
        registry: Registry::standard(),
        threads,
    });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/v1/tests", get(handle_tests))
        .route("/api/v1/run", post(handle_run))
        .with_state(state)
}

/// Run the HTTP server until it fails.
pub async fn run_server(host: &str, port: u16, threads: Option<usize>) -> std::io::Result<()> {
    let app = build_router(threads);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app).await
}
