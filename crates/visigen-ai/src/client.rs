use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parser,
    Scene,
    Validator,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Parser => "parser",
            Stage::Scene => "scene",
            Stage::Validator => "validator",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub stage: Stage,
    pub prompt: &'a str,
    pub response_schema: Option<&'a Value>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("request to the generation service failed: {0}")]
    Transport(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation service returned no text: {0}")]
    Empty(String),
    #[error("model request failed: {0}")]
    Model(String),
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: GenerationClient + ?Sized> GenerationClient for Arc<T> {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }
}

#[async_trait]
impl<T: GenerationClient + ?Sized> GenerationClient for Box<T> {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }
}
