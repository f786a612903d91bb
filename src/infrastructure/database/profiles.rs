use std::sync::Arc;

use serde_json::Value;

use crate::infrastructure::supabase::SupabaseClient;
use crate::models::ProfileType;
use crate::utils::error::Result;

/// Repository des profils personnels et recherchés
#[derive(Clone)]
pub struct ProfilesRepository {
    client: Arc<SupabaseClient>,
}

impl ProfilesRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// Premier profil du type demandé pour un utilisateur
    pub async fn find_by_user(&self, kind: ProfileType, user_id: &str) -> Result<Option<Value>> {
        let rows = self
            .client
            .from(kind.table())
            .select("*")
            .eq("user_id", user_id)
            .limit(1)
            .execute()
            .await?;

        Ok(rows.into_iter().next())
    }

    pub async fn upsert(&self, kind: ProfileType, profile: &Value) -> Result<Vec<Value>> {
        self.client.from(kind.table()).upsert(profile).await
    }

    /// Remplace les champs fournis sur le profil d'un utilisateur
    pub async fn update_for_user(
        &self,
        kind: ProfileType,
        user_id: &str,
        changes: &Value,
    ) -> Result<Vec<Value>> {
        self.client
            .from(kind.table())
            .eq("user_id", user_id)
            .update(changes)
            .await
    }
}
