//! Seams to the text-generation capabilities the pipeline depends on.

use async_trait::async_trait;
use econsql_sql::SchemaContext;

use crate::error::CollaboratorError;
use crate::result::QueryResult;

/// Turns a user question into a candidate SQL string.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        schema: &SchemaContext,
    ) -> Result<String, CollaboratorError>;
}

/// Turns query results into a prose answer.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        question: &str,
        result: &QueryResult,
    ) -> Result<String, CollaboratorError>;
}
