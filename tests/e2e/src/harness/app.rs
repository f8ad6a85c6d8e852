//! Test Application Harness
//!
//! Builds the full router over a temp-directory store with fake
//! collaborators, and provides request/response helpers for driving it
//! with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use engram_core::{
    CurationPipeline, Curator, EngramConfig, MemoryEngine, MemoryStore,
};
use engram_server::http;
use engram_server::state::AppState;

use crate::mocks::{HashEmbedder, ScriptedCurator, TEST_DIMENSIONS};

/// API key every harness app accepts
pub const API_KEY: &str = "e2e-test-key";

/// Admin basic-auth credentials
pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-pass";

/// A fully wired application over a temporary store
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    // Held so the database outlives the test
    _dir: TempDir,
}

impl TestApp {
    /// Default app: auth on, generous rate limits, fact-and-weather
    /// curator script
    pub fn new() -> Self {
        Self::with_options(ScriptedCurator::fact_and_weather(), |_| {})
    }

    /// App with a custom curator script and config tweaks
    pub fn with_options(
        curator: ScriptedCurator,
        configure: impl FnOnce(&mut EngramConfig),
    ) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mut config = EngramConfig {
            db_path: Some(dir.path().join("engram.db")),
            dimensions: TEST_DIMENSIONS,
            api_key: Some(API_KEY.to_string()),
            auth_enabled: true,
            rate_limit_per_minute: 10_000,
            rate_limit_per_hour: 100_000,
            admin_user: Some(ADMIN_USER.to_string()),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            ..EngramConfig::default()
        };
        configure(&mut config);

        let store = Arc::new(
            MemoryStore::open(config.db_path.clone(), config.dimensions).expect("open store"),
        );
        let engine = Arc::new(MemoryEngine::new(store));
        let embedder = Arc::new(HashEmbedder {
            dimensions: config.dimensions,
        });
        let curator: Arc<dyn Curator> = Arc::new(curator);
        let pipeline = Arc::new(CurationPipeline::new(
            Arc::clone(&engine),
            embedder.clone(),
            curator,
        ));

        let state = AppState::new(engine, pipeline, embedder, config);
        let router = http::router(Arc::clone(&state));
        Self {
            router,
            state,
            _dir: dir,
        }
    }

    /// Send one request through the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router never errors")
    }
}

/// Build an authenticated JSON request
pub fn request(method: &str, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json");
    match body {
        Some(json) => builder
            .body(Body::from(serde_json::to_vec(json).expect("body serializes")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

/// Collect a response body as JSON
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}
