//! Pipeline Orchestrator
//!
//! Drives one question through `Start -> Generated -> Validated -> Executed ->
//! Answered`. Each transition is a single method; the first failure moves the
//! run to the terminal `Failed` state and nothing after it runs. Stages are
//! never retried.

use std::sync::Arc;
use std::time::Instant;

use econsql_common::config::AppConfig;
use econsql_common::scrubber::scrub_for_log;
use econsql_error::{EconError, ErrorCode, ErrorContext};
use econsql_sql::{QueryValidator, SchemaContext, SchemaRegistry, ValidationVerdict};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{AnswerSynthesizer, QueryGenerator};
use crate::executor::QueryExecutor;
use crate::llm::ChatModelClient;
use crate::result::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generation,
    Validation,
    Execution,
    Synthesis,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Generation => "generation",
            Stage::Validation => "validation",
            Stage::Execution => "execution",
            Stage::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

impl Stage {
    /// What the end user is told. Never carries store faults or query text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Stage::Validation => "I could not safely run that query.",
            Stage::Execution => "The data store could not answer that.",
            Stage::Generation | Stage::Synthesis => "I could not understand or answer that.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    Generated,
    Validated,
    Executed,
    Answered,
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Answered | PipelineState::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
    pub code: ErrorCode,
    /// Scrubbed diagnostic for logs.
    pub detail: String,
}

impl StageFailure {
    fn new(stage: Stage, reason: &str, code: ErrorCode, detail: impl AsRef<str>) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
            code,
            detail: scrub_for_log(detail.as_ref()),
        }
    }

    pub fn to_econ_error(&self) -> EconError {
        EconError::new(self.code, self.stage.user_message()).with_context(ErrorContext::Stage {
            stage: self.stage.to_string(),
        })
    }
}

/// Final response of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PipelineOutcome {
    Answered {
        answer: String,
    },
    Failed {
        stage: Stage,
        reason: String,
        message: String,
    },
}

/// Everything one run produced. Only the orchestrator writes to it.
#[derive(Debug)]
pub struct PipelineContext {
    pub question: String,
    pub candidate: Option<String>,
    pub verdict: Option<ValidationVerdict>,
    pub result: Option<QueryResult>,
    pub answer: Option<String>,
    pub failure: Option<StageFailure>,
    state: PipelineState,
    trace: Vec<PipelineState>,
}

impl PipelineContext {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            candidate: None,
            verdict: None,
            result: None,
            answer: None,
            failure: None,
            state: PipelineState::Start,
            trace: vec![PipelineState::Start],
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// States visited, in order, starting with `Start`.
    pub fn trace(&self) -> &[PipelineState] {
        &self.trace
    }

    /// Final response, once the run reached a terminal state.
    pub fn outcome(&self) -> Option<PipelineOutcome> {
        match (&self.state, &self.answer) {
            (PipelineState::Answered, Some(answer)) => Some(PipelineOutcome::Answered {
                answer: answer.clone(),
            }),
            (PipelineState::Failed { stage, reason }, _) => Some(PipelineOutcome::Failed {
                stage: *stage,
                reason: reason.clone(),
                message: stage.user_message().to_string(),
            }),
            _ => None,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "pipeline transition");
        self.trace.push(next.clone());
        self.state = next;
    }

    fn fail(&mut self, failure: StageFailure) {
        warn!(
            stage = %failure.stage,
            reason = %failure.reason,
            detail = %failure.detail,
            "pipeline failed"
        );
        let state = PipelineState::Failed {
            stage: failure.stage,
            reason: failure.reason.clone(),
        };
        self.failure = Some(failure);
        self.advance(state);
    }
}

pub struct Pipeline {
    generator: Arc<dyn QueryGenerator>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    validator: QueryValidator,
    executor: Arc<QueryExecutor>,
    schema: SchemaContext,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn QueryGenerator>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        validator: QueryValidator,
        executor: Arc<QueryExecutor>,
    ) -> Self {
        let schema = validator.registry().schema_context();
        Self {
            generator,
            synthesizer,
            validator,
            executor,
            schema,
        }
    }

    /// Wires the registry, validator, executor and chat-model client from
    /// configuration. Collaborators passed in replace the chat-model client.
    pub fn from_config(
        config: &AppConfig,
        generator: Option<Arc<dyn QueryGenerator>>,
        synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
    ) -> Result<Self, EconError> {
        let registry = SchemaRegistry::economic_indicators(&config.store.table)
            .map_err(|e| EconError::new(ErrorCode::InvalidConfig, e.to_string()))?;
        let validator = QueryValidator::new(
            Arc::new(registry),
            config.query_limits.max_rows as u64,
        );
        let executor = Arc::new(QueryExecutor::open(&config.store, config.query_limits)?);

        let (generator, synthesizer) = match (generator, synthesizer) {
            (Some(g), Some(s)) => (g, s),
            (generator, synthesizer) => {
                let client = Arc::new(ChatModelClient::new(&config.model).map_err(|e| {
                    EconError::new(ErrorCode::ModelUnavailable, e.to_string())
                })?);
                info!(model = %client.model(), "chat model client ready");
                let default_generator: Arc<dyn QueryGenerator> = client.clone();
                let default_synthesizer: Arc<dyn AnswerSynthesizer> = client;
                (
                    generator.unwrap_or(default_generator),
                    synthesizer.unwrap_or(default_synthesizer),
                )
            }
        };

        Ok(Self::new(generator, synthesizer, validator, executor))
    }

    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    pub fn executor(&self) -> &Arc<QueryExecutor> {
        &self.executor
    }

    /// Runs the question through every stage once, stopping at the first failure.
    pub async fn run(&self, question: &str) -> PipelineContext {
        let started = Instant::now();
        let mut ctx = PipelineContext::new(question);

        while !ctx.state.is_terminal() {
            match ctx.state {
                PipelineState::Start => self.generate(&mut ctx).await,
                PipelineState::Generated => self.validate(&mut ctx),
                PipelineState::Validated => self.execute(&mut ctx).await,
                PipelineState::Executed => self.synthesize(&mut ctx).await,
                PipelineState::Answered | PipelineState::Failed { .. } => break,
            }
        }

        info!(
            state = ?ctx.state,
            duration_ms = started.elapsed().as_millis() as u64,
            "question finished"
        );
        ctx
    }

    #[instrument(skip_all, fields(stage = "generation"))]
    async fn generate(&self, ctx: &mut PipelineContext) {
        let generated = self.generator.generate(&ctx.question, &self.schema).await;
        match generated {
            Ok(candidate) if !candidate.trim().is_empty() => {
                debug!(sql = %scrub_for_log(&candidate), "candidate generated");
                ctx.candidate = Some(candidate);
                ctx.advance(PipelineState::Generated);
            }
            Ok(_) => ctx.fail(StageFailure::new(
                Stage::Generation,
                "GenerationFailure",
                ErrorCode::GenerationFailure,
                "empty candidate query",
            )),
            Err(e) => ctx.fail(StageFailure::new(
                Stage::Generation,
                "GenerationFailure",
                ErrorCode::GenerationFailure,
                e.to_string(),
            )),
        }
    }

    #[instrument(skip_all, fields(stage = "validation"))]
    fn validate(&self, ctx: &mut PipelineContext) {
        let candidate = ctx.candidate.as_deref().unwrap_or_default();
        let verdict = self.validator.validate(candidate);
        let rejection = verdict.rejection().cloned();
        ctx.verdict = Some(verdict);

        match rejection {
            None => ctx.advance(PipelineState::Validated),
            Some(rejection) => ctx.fail(StageFailure::new(
                Stage::Validation,
                rejection.reason(),
                rejection.code(),
                rejection.to_string(),
            )),
        }
    }

    #[instrument(skip_all, fields(stage = "execution"))]
    async fn execute(&self, ctx: &mut PipelineContext) {
        let Some(ValidationVerdict::Accepted(query)) = &ctx.verdict else {
            ctx.fail(StageFailure::new(
                Stage::Execution,
                "StoreError",
                ErrorCode::Internal,
                "no accepted query to execute",
            ));
            return;
        };

        let executed = self.executor.execute(query).await;
        match executed {
            Ok(result) => {
                ctx.result = Some(result);
                ctx.advance(PipelineState::Executed);
            }
            Err(failure) => {
                let code = failure.to_econ_error().code;
                ctx.fail(StageFailure::new(
                    Stage::Execution,
                    failure.reason(),
                    code,
                    failure.to_string(),
                ));
            }
        }
    }

    #[instrument(skip_all, fields(stage = "synthesis"))]
    async fn synthesize(&self, ctx: &mut PipelineContext) {
        let Some(result) = &ctx.result else {
            ctx.fail(StageFailure::new(
                Stage::Synthesis,
                "SynthesisFailure",
                ErrorCode::Internal,
                "no result to synthesize from",
            ));
            return;
        };

        let synthesized = self.synthesizer.synthesize(&ctx.question, result).await;
        match synthesized {
            Ok(answer) if !answer.trim().is_empty() => {
                ctx.answer = Some(answer);
                ctx.advance(PipelineState::Answered);
            }
            Ok(_) => ctx.fail(StageFailure::new(
                Stage::Synthesis,
                "SynthesisFailure",
                ErrorCode::SynthesisFailure,
                "empty answer",
            )),
            Err(e) => ctx.fail(StageFailure::new(
                Stage::Synthesis,
                "SynthesisFailure",
                ErrorCode::SynthesisFailure,
                e.to_string(),
            )),
        }
    }
}
