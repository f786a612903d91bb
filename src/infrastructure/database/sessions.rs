use std::sync::Arc;

use crate::infrastructure::supabase::SupabaseClient;
use crate::models::{NewSession, SessionClosure};
use crate::utils::{error::Result, value_to_string};

const TABLE: &str = "sessions";

/// Repository des sessions de chat
#[derive(Clone)]
pub struct SessionsRepository {
    client: Arc<SupabaseClient>,
}

impl SessionsRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// Session active la plus récente d'un utilisateur
    pub async fn latest_active_id(&self, user_id: &str) -> Result<Option<String>> {
        let rows = self
            .client
            .from(TABLE)
            .select("id")
            .eq("user_id", user_id)
            .eq("status", "active")
            .order("last_activity", true)
            .limit(1)
            .execute()
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("id"))
            .map(value_to_string))
    }

    pub async fn insert(&self, session: &NewSession) -> Result<()> {
        let payload = serde_json::to_value(session)?;
        self.client.from(TABLE).insert(&payload).await?;
        Ok(())
    }

    /// Enregistre la fermeture d'une session
    pub async fn close(&self, session_id: &str, closure: &SessionClosure) -> Result<()> {
        let payload = serde_json::to_value(closure)?;
        self.client
            .from(TABLE)
            .eq("id", session_id)
            .update(&payload)
            .await?;
        Ok(())
    }
}
