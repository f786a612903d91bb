// infrastructure/llm/azure.rs
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CompletionOptions, EmbeddingModel, LanguageModel, PromptMessage};
use crate::utils::error::{AppError, Result};

/// Client Azure OpenAI (chat completions et embeddings)
#[derive(Clone)]
pub struct AzureOpenAiClient {
    http_client: Arc<HttpClient>,
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl AzureOpenAiClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        api_version: &str,
        deployment: &str,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("Client HTTP Azure OpenAI: {}", e)))?;

        Ok(Self {
            http_client: Arc::new(http_client),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: api_version.to_string(),
            deployment: deployment.to_string(),
        })
    }

    /// Même connexion, autre déploiement
    pub fn with_deployment(&self, deployment: &str) -> Self {
        Self {
            deployment: deployment.to_string(),
            ..self.clone()
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    fn url(&self, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, self.deployment, operation, self.api_version
        )
    }

    async fn post(&self, operation: &str, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(self.url(operation))
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("{}: {}", status.as_u16(), text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiClient {
    async fn complete(&self, messages: &[PromptMessage], options: &CompletionOptions) -> Result<String> {
        let mut body = json!({ "messages": messages });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if options.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        debug!("Azure OpenAI {}: {} messages", self.deployment, messages.len());
        let response: ChatCompletionResponse = self
            .post("chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| AppError::ParseError(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm("Réponse vide du modèle".to_string()))
    }
}

#[async_trait]
impl EmbeddingModel for AzureOpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbeddingResponse = self
            .post("embeddings", &json!({ "input": text }))
            .await?
            .json()
            .await
            .map_err(|e| AppError::ParseError(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| AppError::Llm("Réponse d'embedding vide de l'API".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }
}
