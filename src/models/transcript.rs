// Modèle: transcript.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Un échange d'une conversation vocale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exchange {
    /// `user` ou `agent`
    pub speaker: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl Exchange {
    pub fn is_user(&self) -> bool {
        self.speaker == "user"
    }

    pub fn timestamp_text(&self) -> String {
        self.timestamp
            .as_ref()
            .map(crate::utils::value_to_string)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMetadata {
    pub call_id: String,
    pub start_time: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcriber {
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSettings {
    pub transcriber: Transcriber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContent {
    #[serde(default)]
    pub structured_exchanges: Vec<Exchange>,
}

/// Données d'appel extraites d'un webhook VAPI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFeatures {
    pub call_metadata: CallMetadata,
    pub technical_settings: TechnicalSettings,
    pub conversation_content: ConversationContent,
}

/// Erreur d'extraction renvoyée telle quelle par le webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionError {
    pub error: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExtractionError {
    pub fn new(error: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            error: error.into(),
            status: "error".to_string(),
            details,
        }
    }
}

/// Issue du routage d'un transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteOutcome {
    pub success: bool,
    pub message: String,
}

impl RouteOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Transcript formaté pour l'analyse de profil
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedTranscript {
    pub conversation_id: String,
    pub user_name: String,
    pub timestamp: String,
    pub customer_phone: Option<String>,
    pub transcript: Vec<Exchange>,
    pub detected_languages: Vec<String>,
}
