//! econsql Server: the HTTP surface of the question pipeline.
//!
//! - **REST (8080)**: `/api/v1/ask`, `/api/v1/validate`, `/api/v1/schema`.
//! - **Probes**: `/health` (process is up) and `/ready` (store answers a probe).
//! - **Observability**: Prometheus metrics on `/metrics`.
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use econsql_common::config::AppConfig;
use econsql_runtime::{AnswerSynthesizer, Pipeline, QueryGenerator};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

pub mod api;

pub use api::ApiError;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static QUESTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("econsql_questions_total", "Total number of questions received");
    let counter = IntCounter::with_opts(opts).expect("valid metric options");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registered once");
    counter
});

pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "econsql_stage_failures_total",
        "Questions that ended in a failed stage",
    );
    let counter = IntCounterVec::new(opts, &["stage", "reason"]).expect("valid metric options");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registered once");
    counter
});

pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    let opts = Opts::new(
        "econsql_active_sessions",
        "Number of currently open store sessions",
    );
    let gauge = IntGauge::with_opts(opts).expect("valid metric options");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("metric registered once");
    gauge
});

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Full router: probes and metrics at the root, the API under `/api/v1`.
pub fn app(state: AppState) -> Router {
    let probes = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone());

    probes.nest("/api/v1", api::create_api_router(state))
}

pub struct EconServer {
    config: AppConfig,
    generator: Option<Arc<dyn QueryGenerator>>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
}

impl EconServer {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            generator: None,
            synthesizer: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn QueryGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Serves until SIGINT/SIGTERM, then drains in-flight store sessions.
    pub async fn run(self) -> anyhow::Result<()> {
        let pipeline = Pipeline::from_config(&self.config, self.generator, self.synthesizer)
            .context("Failed to build the question pipeline")?;
        let state = AppState::new(pipeline);
        let executor = state.pipeline.executor().clone();

        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address {}", self.config.server.listen_addr))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("API server listening on {}", addr);

        axum::serve(listener, app(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("API server error")?;

        executor.close().await;
        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("shutdown signal received");
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let table = state
        .pipeline
        .validator()
        .registry()
        .table_names()
        .into_iter()
        .next()
        .unwrap_or_default();
    state.pipeline.executor().probe(&table).await?;
    Ok(Json(json!({ "status": "ready" })))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    ACTIVE_SESSIONS.set(state.pipeline.executor().active_sessions() as i64);
    // Touch the counters so they are exported before the first question.
    Lazy::force(&QUESTIONS_TOTAL);
    Lazy::force(&STAGE_FAILURES);

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
