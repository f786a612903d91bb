pub mod supabase;
pub mod database;
pub mod llm;
pub mod queue;

pub use supabase::SupabaseClient;
pub use database::Database;
pub use llm::{AzureOpenAiClient, CompletionOptions, EmbeddingModel, LanguageModel, PromptMessage, PromptRole};
pub use queue::{MemoryQueue, RedisQueue, TranscriptQueue};
