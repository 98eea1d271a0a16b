//! econsql runtime: from question to answer.
//!
//! ```text
//! question ─► QueryGenerator ─► QueryValidator ─► QueryExecutor ─► AnswerSynthesizer ─► answer
//!                  │                  │                 │                  │
//!                  └──────────────────┴───── Failed(stage, reason) ◄───────┘
//! ```
//!
//! The validator lives in `econsql-sql`; this crate owns execution against the
//! SQLite store, the chat-model collaborators and the orchestrating state machine.

pub mod collaborators;
pub mod error;
pub mod executor;
pub mod llm;
pub mod markdown;
pub mod pipeline;
pub mod prompt;
pub mod result;
pub mod session;

pub use collaborators::{AnswerSynthesizer, QueryGenerator};
pub use error::{CollaboratorError, ExecutionFailure};
pub use executor::QueryExecutor;
pub use llm::ChatModelClient;
pub use pipeline::{Pipeline, PipelineContext, PipelineOutcome, PipelineState, Stage, StageFailure};
pub use result::{QueryResult, ScalarValue};
