pub mod users;
pub mod messages;
pub mod sessions;
pub mod profiles;
pub mod conversations;
pub mod embeddings;

pub use users::UsersRepository;
pub use messages::MessagesRepository;
pub use sessions::SessionsRepository;
pub use profiles::ProfilesRepository;
pub use conversations::ConversationsRepository;
pub use embeddings::EmbeddingsRepository;

use crate::infrastructure::supabase::SupabaseClient;
use crate::utils::error::Result;
use std::sync::Arc;
use tracing::info;

/// Accès aux tables Supabase
#[derive(Clone)]
pub struct Database {
    pub client: Arc<SupabaseClient>,
    pub users: UsersRepository,
    pub messages: MessagesRepository,
    pub sessions: SessionsRepository,
    pub profiles: ProfilesRepository,
    pub conversations: ConversationsRepository,
    pub embeddings: EmbeddingsRepository,
}

impl Database {
    /// Crée le client Supabase et les repositories
    pub fn new(url: &str, api_key: &str, timeout_seconds: u64) -> Result<Self> {
        info!("🔌 Connexion à Supabase: {}", url);
        let client = Arc::new(SupabaseClient::new(url, api_key, timeout_seconds)?);
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Arc<SupabaseClient>) -> Self {
        Self {
            users: UsersRepository::new(client.clone()),
            messages: MessagesRepository::new(client.clone()),
            sessions: SessionsRepository::new(client.clone()),
            profiles: ProfilesRepository::new(client.clone()),
            conversations: ConversationsRepository::new(client.clone()),
            embeddings: EmbeddingsRepository::new(client.clone()),
            client,
        }
    }

    /// Création pour les tests (pointe vers un serveur simulé)
    #[cfg(test)]
    pub fn new_test(url: &str) -> Self {
        Self::with_client(Arc::new(
            SupabaseClient::new(url, "test-key", 5).expect("client de test"),
        ))
    }
}
