// test_utils.rs
//! Doublures partagées par les tests unitaires.

use crate::infrastructure::llm::{CompletionOptions, EmbeddingModel, LanguageModel, PromptMessage};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Modèle de langage qui rejoue des réponses prévues
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<(Vec<PromptMessage>, CompletionOptions)>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Prompts reçus, dans l'ordre
    pub async fn calls(&self) -> Vec<Vec<PromptMessage>> {
        self.calls.lock().await.iter().map(|(m, _)| m.clone()).collect()
    }

    pub async fn options(&self) -> Vec<CompletionOptions> {
        self.calls.lock().await.iter().map(|(_, o)| o.clone()).collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[PromptMessage], options: &CompletionOptions) -> Result<String> {
        self.calls
            .lock()
            .await
            .push((messages.to_vec(), options.clone()));
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Llm("aucune réponse prévue".to_string())))
    }
}

/// Modèle d'embedding à vecteur constant
pub struct FixedEmbedder {
    pub dimensions: usize,
    pub fail: bool,
}

impl FixedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, fail: false }
    }

    pub fn failing() -> Self {
        Self { dimensions: 0, fail: true }
    }
}

#[async_trait]
impl EmbeddingModel for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(AppError::Llm("service indisponible".to_string()));
        }
        Ok(vec![0.1; self.dimensions])
    }

    fn model_name(&self) -> &str {
        "text-embedding-3-small"
    }
}

/// Tables Supabase utilisées par le chat
///
/// `user_id` absent : aucun utilisateur ne correspond au numéro.
pub async fn mount_chat_supabase(server: &MockServer, user_id: Option<&str>) {
    let users = match user_id {
        Some(id) => json!([{ "id": id }]),
        None => json!([]),
    };

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": "message-1" }])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/personal_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "Marie" }])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}
