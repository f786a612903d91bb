use std::sync::Arc;

use serde_json::Value;

use crate::infrastructure::supabase::SupabaseClient;
use crate::models::{HistoryRow, NewMessage};
use crate::utils::error::{AppError, Result};

const TABLE: &str = "messages";

/// Repository des messages échangés avec Jackie
#[derive(Clone)]
pub struct MessagesRepository {
    client: Arc<SupabaseClient>,
}

impl MessagesRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// Derniers messages d'un numéro, du plus récent au plus ancien
    pub async fn recent_by_phone(&self, phone_number: &str, limit: usize) -> Result<Vec<HistoryRow>> {
        let rows = self
            .client
            .from(TABLE)
            .select("content,direction,created_at")
            .eq("phone_number", phone_number)
            .order("created_at", true)
            .limit(limit)
            .execute()
            .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value::<HistoryRow>(row).map_err(AppError::from))
            .collect()
    }

    /// Derniers messages complets d'un utilisateur
    pub async fn recent_by_user(&self, user_id: &str, limit: usize) -> Result<Vec<Value>> {
        self.client
            .from(TABLE)
            .select("*")
            .eq("user_id", user_id)
            .order("created_at", true)
            .limit(limit)
            .execute()
            .await
    }

    /// Insère un message et renvoie la ligne créée
    pub async fn insert(&self, message: &NewMessage) -> Result<Option<Value>> {
        let payload = serde_json::to_value(message)?;
        let rows = self.client.from(TABLE).insert(&payload).await?;
        Ok(rows.into_iter().next())
    }
}
