use std::sync::Arc;

use serde_json::{json, Value};

use crate::infrastructure::supabase::SupabaseClient;
use crate::models::ProfileType;
use crate::utils::{error::Result, now_iso, value_to_string};

const TABLE: &str = "profile_embeddings";

const STATS_QUERY: &str = "
        SELECT
            COUNT(*) as total_embeddings,
            COUNT(CASE WHEN profile_type = 'personal' THEN 1 END) as personal_embeddings,
            COUNT(CASE WHEN profile_type = 'desired' THEN 1 END) as desired_embeddings,
            COUNT(DISTINCT user_id) as unique_users,
            MAX(updated_at) as last_updated
        FROM profile_embeddings
        ";

/// Repository des embeddings de profils
#[derive(Clone)]
pub struct EmbeddingsRepository {
    client: Arc<SupabaseClient>,
}

impl EmbeddingsRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// Identifiant de l'embedding existant pour un profil
    pub async fn find_id(&self, profile_id: &str, kind: ProfileType) -> Result<Option<Value>> {
        let rows = self
            .client
            .from(TABLE)
            .select("id")
            .eq("profile_id", profile_id)
            .eq("profile_type", kind.as_str())
            .execute()
            .await?;

        Ok(rows.into_iter().next().and_then(|mut row| row.get_mut("id").map(Value::take)))
    }

    pub async fn update_vector(&self, id: &Value, embedding: &[f32]) -> Result<()> {
        self.client
            .from(TABLE)
            .eq("id", value_to_string(id))
            .update(&json!({
                "embedding": embedding,
                "updated_at": now_iso(),
            }))
            .await?;
        Ok(())
    }

    /// Insère un embedding et renvoie l'identifiant créé
    pub async fn insert(
        &self,
        user_id: &str,
        kind: ProfileType,
        profile_id: &str,
        embedding: &[f32],
    ) -> Result<Option<Value>> {
        let rows = self
            .client
            .from(TABLE)
            .insert(&json!({
                "user_id": user_id,
                "profile_type": kind.as_str(),
                "profile_id": profile_id,
                "embedding": embedding,
            }))
            .await?;

        Ok(rows.into_iter().next().and_then(|mut row| row.get_mut("id").map(Value::take)))
    }

    /// Requête légère pour vérifier la connexion
    pub async fn probe(&self) -> Result<()> {
        self.client.from(TABLE).select("count").limit(1).execute().await?;
        Ok(())
    }

    /// Statistiques agrégées via la fonction `execute_sql`
    pub async fn stats(&self) -> Result<Option<Value>> {
        let value = self
            .client
            .rpc("execute_sql", &json!({ "query": STATS_QUERY }))
            .await?;

        Ok(match value {
            Value::Array(rows) => rows.into_iter().next(),
            Value::Null => None,
            other => Some(other),
        })
    }
}
