// Modèle: session.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Statut d'une session de chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// Session à insérer dans la table `sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub id: String,
    pub user_id: String,
    pub phone_number: String,
    pub start_time: String,
    pub last_activity: String,
    pub status: SessionStatus,
    pub metadata: Value,
}

/// Compteurs enregistrés à la fermeture d'une session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionCounts {
    pub message_count: usize,
    pub user_messages: usize,
    pub ai_messages: usize,
}

/// Mise à jour appliquée à la fermeture d'une session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClosure {
    pub end_time: String,
    pub last_activity: String,
    /// Messages de la session sérialisés en chaîne JSON
    pub messages: String,
    pub status: SessionStatus,
    pub metadata: SessionCounts,
}

/// Message persisté dans la colonne `messages` d'une session fermée
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: String,
}
