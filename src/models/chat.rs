// Modèle: chat.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Requête de chat (`POST /chat`)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatRequest {
    /// Numéro de l'expéditeur, le numéro par défaut est utilisé s'il est absent
    #[serde(default)]
    pub phone_number: Option<String>,
    #[validate(length(min = 1, message = "Le message est requis"))]
    pub message: String,
}

/// Réponse de chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
}

/// Auteur d'un tour de conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Ai,
}

impl TurnRole {
    /// Nom de type conservé dans l'historique de session persisté
    pub fn message_type(&self) -> &'static str {
        match self {
            TurnRole::User => "HumanMessage",
            TurnRole::Ai => "AIMessage",
        }
    }

    /// Libellé utilisé dans les logs
    pub fn label(&self) -> &'static str {
        match self {
            TurnRole::User => "Utilisateur",
            TurnRole::Ai => "IA",
        }
    }
}

/// Un tour de conversation (message utilisateur ou réponse IA)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Ai,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Message tel qu'exposé par l'endpoint de monitoring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorMessage {
    #[serde(rename = "type")]
    pub kind: TurnRole,
    pub content: String,
}

/// Session active exposée par `GET /monitor/active-sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSessionView {
    pub session_id: String,
    pub phone_number: String,
    pub messages_count: usize,
    pub messages: Vec<MonitorMessage>,
    pub last_activity: Option<String>,
}

/// Réponse de monitoring des sessions actives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSessionsReport {
    pub count: usize,
    pub sessions: Vec<ActiveSessionView>,
}
