// core/mod.rs
pub mod prompts;
pub mod history;
pub mod session_manager;
pub mod chat_service;
pub mod transcript_router;
pub mod profile_generator;
pub mod profile_updater;
pub mod embedding_service;

// Ré-exports pour faciliter l'import
pub use history::ConversationHistory;
pub use session_manager::SessionManager;
pub use chat_service::{ChatService, UserContext};
pub use transcript_router::{extract_call_features, ProfileGeneratorTarget, TranscriptRouter};
pub use profile_generator::{ProfileGenerator, TranscriptAnalyzer};
pub use profile_updater::ProfileUpdater;
pub use embedding_service::EmbeddingService;
