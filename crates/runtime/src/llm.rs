//! OpenAI-compatible chat-completions client.
//!
//! One client serves both collaborator roles: it turns questions into SQL and
//! query results into answers. Any endpoint that speaks `/chat/completions`
//! works (hosted APIs, vLLM, Ollama, LiteLLM proxies).

use std::time::Duration;

use async_trait::async_trait;
use econsql_common::config::ModelSettings;
use econsql_common::scrubber::scrub_for_log;
use econsql_sql::SchemaContext;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::{AnswerSynthesizer, QueryGenerator};
use crate::error::CollaboratorError;
use crate::markdown::extract_sql;
use crate::prompt::{generation_instructions, synthesis_instructions};
use crate::result::QueryResult;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct ChatModelClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl ChatModelClient {
    pub fn new(settings: &ModelSettings) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.name.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = scrub_for_log(&body);
            warn!(status = status.as_u16(), body = %body, "chat model returned an error");
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(model = %self.model, chars = content.len(), "chat model replied");
        Ok(content)
    }
}

#[async_trait]
impl QueryGenerator for ChatModelClient {
    async fn generate(
        &self,
        question: &str,
        schema: &SchemaContext,
    ) -> Result<String, CollaboratorError> {
        let reply = self
            .complete(&generation_instructions(schema), question)
            .await?;
        Ok(extract_sql(&reply))
    }
}

#[async_trait]
impl AnswerSynthesizer for ChatModelClient {
    async fn synthesize(
        &self,
        question: &str,
        result: &QueryResult,
    ) -> Result<String, CollaboratorError> {
        let answer = self
            .complete(&synthesis_instructions(result), question)
            .await?;
        Ok(answer.trim().to_string())
    }
}
