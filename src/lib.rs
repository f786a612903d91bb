// src/lib.rs
// Modules principaux
pub mod models;
pub mod api;
pub mod core;
pub mod infrastructure;
pub mod services;
pub mod utils;
pub mod workers;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::{
    ChatService, EmbeddingService, ProfileGenerator, ProfileGeneratorTarget, ProfileUpdater,
    SessionManager, TranscriptRouter,
};
use crate::infrastructure::{
    AzureOpenAiClient, Database, EmbeddingModel, LanguageModel, MemoryQueue, RedisQueue,
    TranscriptQueue,
};
use crate::services::ProfileGeneratorClient;
use crate::utils::{Config, Result};

// Version de l'application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Jackie Backend";

/// Modèles utilisés par les services
pub struct Models {
    /// Conversation avec Jackie
    pub chat: Arc<dyn LanguageModel>,
    /// Extraction et mise à jour de profils
    pub analysis: Arc<dyn LanguageModel>,
    pub embedding: Arc<dyn EmbeddingModel>,
}

/// État partagé par les handlers et les workers
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub sessions: Arc<SessionManager>,
    pub chat: ChatService,
    pub router: TranscriptRouter,
    pub generator: Arc<ProfileGenerator>,
    pub updater: Arc<ProfileUpdater>,
    pub embeddings: EmbeddingService,
    pub queue: Arc<dyn TranscriptQueue>,
}

impl AppState {
    /// Connecte Supabase, Azure OpenAI et la file des transcripts
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Database::new(&config.supabase_url, &config.supabase_key, config.http_timeout_seconds)?;

        let azure = AzureOpenAiClient::new(
            &config.azure_openai_endpoint,
            &config.azure_openai_api_key,
            &config.azure_openai_api_version,
            &config.azure_openai_deployment_name,
            config.http_timeout_seconds,
        )?;
        info!("🤖 Azure OpenAI: déploiement {}", azure.deployment());
        let models = Models {
            analysis: Arc::new(azure.with_deployment(&config.azure_openai_analysis_deployment)),
            embedding: Arc::new(azure.with_deployment(&config.azure_openai_embedding_deployment)),
            chat: Arc::new(azure),
        };

        let queue: Arc<dyn TranscriptQueue> = match &config.redis_url {
            Some(url) => Arc::new(RedisQueue::new(url, &config.transcript_queue_name).await?),
            None => {
                warn!("⚠️  REDIS_URL absent, file des transcripts en mémoire");
                Arc::new(MemoryQueue::new(&config.transcript_queue_name))
            }
        };

        Self::build(config, db, models, queue)
    }

    /// Assemble les services à partir de dépendances déjà créées
    pub fn build(
        config: Config,
        db: Database,
        models: Models,
        queue: Arc<dyn TranscriptQueue>,
    ) -> Result<Self> {
        let sessions = Arc::new(SessionManager::new(
            db.clone(),
            Duration::from_secs(config.session_timeout_seconds),
            config.history_max_messages,
        ));
        let chat = ChatService::new(
            db.clone(),
            sessions.clone(),
            models.chat,
            config.chat_temperature,
            config.inline_sweep_probability,
        );

        let generator = Arc::new(ProfileGenerator::new(db.clone(), models.analysis.clone()));
        let target = match &config.profile_generator_url {
            Some(url) => {
                info!("📤 Générateur de profils distant: {}", url);
                ProfileGeneratorTarget::Remote(ProfileGeneratorClient::new(
                    url,
                    config.profile_function_key.clone(),
                    config.http_timeout_seconds,
                )?)
            }
            None => ProfileGeneratorTarget::Local(generator.clone()),
        };
        let router = TranscriptRouter::new(db.users.clone(), queue.clone(), target);

        let updater = Arc::new(ProfileUpdater::new(db.clone(), models.analysis));
        let embeddings = EmbeddingService::new(db.clone(), models.embedding);

        Ok(Self {
            config,
            db,
            sessions,
            chat,
            router,
            generator,
            updater,
            embeddings,
            queue,
        })
    }

    /// État de test : Supabase simulé, modèles et file fournis
    #[cfg(test)]
    pub fn new_test(
        supabase_url: &str,
        chat: Arc<dyn LanguageModel>,
        embedding: Arc<dyn EmbeddingModel>,
    ) -> Self {
        let config = Config::new_test(supabase_url);
        let models = Models {
            analysis: chat.clone(),
            chat,
            embedding,
        };
        let queue = Arc::new(MemoryQueue::new(&config.transcript_queue_name));
        Self::build(config, Database::new_test(supabase_url), models, queue)
            .expect("état de test")
    }
}
