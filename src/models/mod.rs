// Modèle: chat.rs
pub mod chat;
pub use chat::{
    ChatRequest, ChatResponse, ChatTurn, TurnRole,
    MonitorMessage, ActiveSessionView, ActiveSessionsReport,
};

// Modèle: message.rs
pub mod message;
pub use message::{Direction, MessageMetadata, NewMessage, HistoryRow};

// Modèle: session.rs
pub mod session;
pub use session::{
    NewSession, SessionStatus, SessionClosure,
    SessionCounts, ArchivedMessage,
};

// Modèle: transcript.rs
pub mod transcript;
pub use transcript::{
    CallFeatures, CallMetadata, TechnicalSettings, Transcriber,
    ConversationContent, Exchange, ExtractionError,
    RouteOutcome, FormattedTranscript,
};

// Modèle: embedding.rs
pub mod embedding;
pub use embedding::{
    ProfileType, EmbeddingRequest, EmbeddingResponse,
    StorageStatus, StorageResult, BatchItem, BatchReport,
};

use serde::{Deserialize, Serialize};

/// Réponse d'erreur standard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<serde_json::Value>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
