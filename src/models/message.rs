// Modèle: message.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat::TurnRole;

/// Sens d'un message stocké
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }

    /// Statut de livraison enregistré dans les métadonnées
    pub fn delivery_status(&self) -> &'static str {
        match self {
            Direction::Incoming => "received",
            Direction::Outgoing => "sent",
        }
    }

    pub fn turn_role(&self) -> TurnRole {
        match self {
            Direction::Incoming => TurnRole::User,
            Direction::Outgoing => TurnRole::Ai,
        }
    }
}

/// Métadonnées d'un message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    pub status: String,
    pub timestamp: String,
}

/// Message à insérer dans la table `messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: Uuid,
    pub user_id: String,
    pub phone_number: String,
    pub content: String,
    pub direction: Direction,
    pub message_type: String,
    pub metadata: MessageMetadata,
}

impl NewMessage {
    pub fn new(user_id: &str, phone_number: &str, content: &str, direction: Direction) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            phone_number: phone_number.to_string(),
            content: content.to_string(),
            direction,
            message_type: "terminal".to_string(),
            metadata: MessageMetadata {
                status: direction.delivery_status().to_string(),
                timestamp: crate::utils::now_iso(),
            },
        }
    }
}

/// Ligne d'historique lue depuis la table `messages`
///
/// La direction reste une chaîne : les valeurs inconnues sont ignorées
/// au chargement de l'historique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub content: String,
    pub direction: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl HistoryRow {
    /// Date de création, avec ou sans fuseau selon le schéma de la colonne
    pub fn created_at_utc(&self) -> DateTime<Utc> {
        let Some(raw) = self.created_at.as_deref() else {
            return Utc::now();
        };

        DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .or_else(|_| {
                chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
            })
            .unwrap_or_else(|_| Utc::now())
    }

    pub fn direction(&self) -> Option<Direction> {
        match self.direction.as_str() {
            "incoming" => Some(Direction::Incoming),
            "outgoing" => Some(Direction::Outgoing),
            _ => None,
        }
    }
}
