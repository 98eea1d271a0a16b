use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use econsql_error::{EconError, ErrorCategory, ErrorCode};
use econsql_runtime::PipelineOutcome;
use econsql_sql::{Rejection, TableSchema, ValidationVerdict};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, QUESTIONS_TOTAL, STAGE_FAILURES};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EconError>,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub dialect: &'static str,
    pub tables: Vec<TableSchema>,
}

/// An [`EconError`] rendered as JSON with a status picked from its category.
#[derive(Debug)]
pub struct ApiError(pub EconError);

impl From<EconError> for ApiError {
    fn from(err: EconError) -> Self {
        Self(err)
    }
}

pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Execution => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Model => StatusCode::BAD_GATEWAY,
        ErrorCategory::Config | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(self.0.category()), Json(self.0)).into_response()
    }
}

pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .merge(create_question_router(state.clone()))
        .merge(create_validation_router(state.clone()))
        .merge(create_schema_router(state))
}

pub fn create_question_router(state: AppState) -> Router {
    Router::new()
        .route("/ask", post(ask_question))
        .with_state(state)
}

pub fn create_validation_router(state: AppState) -> Router {
    Router::new()
        .route("/validate", post(validate_query))
        .with_state(state)
}

pub fn create_schema_router(state: AppState) -> Router {
    Router::new()
        .route("/schema", get(describe_schema))
        .with_state(state)
}

async fn ask_question(
    State(state): State<AppState>,
    Json(payload): Json<AskRequest>,
) -> Result<(StatusCode, Json<PipelineOutcome>), ApiError> {
    QUESTIONS_TOTAL.inc();
    let ctx = state.pipeline.run(&payload.question).await;
    let outcome = ctx.outcome().ok_or_else(|| {
        ApiError(EconError::new(
            ErrorCode::Internal,
            format!("pipeline stopped in state {:?}", ctx.state()),
        ))
    })?;

    match &outcome {
        PipelineOutcome::Answered { .. } => Ok((StatusCode::OK, Json(outcome))),
        PipelineOutcome::Failed { stage, reason, .. } => {
            let stage = stage.to_string();
            STAGE_FAILURES
                .with_label_values(&[stage.as_str(), reason.as_str()])
                .inc();
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(outcome)))
        }
    }
}

async fn validate_query(
    State(state): State<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> Json<ValidateResponse> {
    let validator = state.pipeline.validator();
    let response = match validator.validate(&payload.sql) {
        ValidationVerdict::Accepted(query) => ValidateResponse {
            accepted: true,
            sql: Some(query.sql().to_string()),
            row_limit: Some(query.row_limit()),
            rejection: None,
            error: None,
        },
        ValidationVerdict::Rejected(rejection) => {
            info!(reason = rejection.reason(), "validation request rejected");
            ValidateResponse {
                accepted: false,
                sql: None,
                row_limit: None,
                error: Some(rejection.to_econ_error(validator.registry())),
                rejection: Some(rejection),
            }
        }
    };
    Json(response)
}

async fn describe_schema(State(state): State<AppState>) -> Json<SchemaResponse> {
    let registry = state.pipeline.validator().registry();
    Json(SchemaResponse {
        dialect: registry.schema_context().dialect,
        tables: registry.tables().to_vec(),
    })
}
