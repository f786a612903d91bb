// infrastructure/llm/mod.rs
pub mod azure;

pub use azure::AzureOpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Rôle d'un message de prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: PromptRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: PromptRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: PromptRole::Assistant, content: content.into() }
    }
}

/// Paramètres d'une complétion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Force une réponse JSON (`response_format: json_object`)
    pub json_mode: bool,
}

impl CompletionOptions {
    pub fn json() -> Self {
        Self { json_mode: true, ..Default::default() }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Modèle de langage conversationnel
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage], options: &CompletionOptions) -> Result<String>;
}

/// Modèle d'embedding de texte
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}
