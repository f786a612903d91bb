// Modèle: embedding.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type de profil associé à un embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileType {
    Personal,
    Desired,
}

impl ProfileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Personal => "personal",
            ProfileType::Desired => "desired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "personal" => Some(ProfileType::Personal),
            "desired" => Some(ProfileType::Desired),
            _ => None,
        }
    }

    /// Table source du profil
    pub fn table(&self) -> &'static str {
        match self {
            ProfileType::Personal => "personal_profiles",
            ProfileType::Desired => "desired_profiles",
        }
    }

    /// Clé utilisée dans la réponse `generate-for-user`
    pub fn result_key(&self) -> &'static str {
        match self {
            ProfileType::Personal => "personal_profile",
            ProfileType::Desired => "desired_profile",
        }
    }
}

/// Requête `POST /api/embeddings/generate`, après validation des champs
#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub user_id: String,
    pub profile_type: ProfileType,
    pub profile_id: String,
    pub text: String,
}

/// Statut du stockage d'un embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    Updated,
    Created,
    Error,
}

/// Résultat du stockage d'un embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageResult {
    pub status: StorageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StorageResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: StorageStatus::Error,
            id: None,
            message: Some(message.into()),
        }
    }
}

/// Réponse de `POST /api/embeddings/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub user_id: String,
    pub profile_type: ProfileType,
    pub profile_id: String,
    pub embedding_status: StorageStatus,
    pub dimensions: usize,
    pub processing_time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_id: Option<Value>,
}

/// Résultat par utilisateur d'un traitement par lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub user_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Réponse de `POST /api/embeddings/batch`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_users: usize,
    pub processed_count: usize,
    pub successful_count: usize,
    pub error_count: usize,
    pub results: Vec<BatchItem>,
}
