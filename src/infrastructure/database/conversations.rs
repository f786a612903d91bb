use std::sync::Arc;

use serde_json::Value;

use crate::infrastructure::supabase::SupabaseClient;
use crate::utils::error::Result;

const TABLE: &str = "conversations";

/// Repository des conversations vocales archivées
#[derive(Clone)]
pub struct ConversationsRepository {
    client: Arc<SupabaseClient>,
}

impl ConversationsRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// Transcript de la dernière conversation (`content->transcript`)
    pub async fn latest_transcript(&self, user_id: &str) -> Result<Option<Value>> {
        let rows = self
            .client
            .from(TABLE)
            .select("content->transcript")
            .eq("user_id", user_id)
            .order("created_at", true)
            .limit(1)
            .execute()
            .await?;

        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.get_mut("transcript").map(Value::take))
            .filter(|transcript| !transcript.is_null()))
    }

    pub async fn insert(&self, conversation: &Value) -> Result<Vec<Value>> {
        self.client.from(TABLE).insert(conversation).await
    }
}
