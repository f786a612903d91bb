use std::sync::Arc;

use serde_json::Value;

use crate::infrastructure::supabase::SupabaseClient;
use crate::utils::{error::Result, value_to_string};

const TABLE: &str = "users";

/// Repository pour les opérations sur les utilisateurs
#[derive(Clone)]
pub struct UsersRepository {
    client: Arc<SupabaseClient>,
}

impl UsersRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// Identifiant de l'utilisateur associé à un numéro de téléphone
    pub async fn find_id_by_phone(&self, phone_number: &str) -> Result<Option<String>> {
        let rows = self
            .client
            .from(TABLE)
            .select("id")
            .eq("phone_number", phone_number)
            .execute()
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("id"))
            .map(value_to_string))
    }

    pub async fn exists_by_phone(&self, phone_number: &str) -> Result<bool> {
        Ok(self.find_id_by_phone(phone_number).await?.is_some())
    }

    /// Crée ou met à jour un utilisateur (clé `id`)
    pub async fn upsert(&self, user: &Value) -> Result<Vec<Value>> {
        self.client.from(TABLE).upsert(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_find_id_by_phone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("phone_number", "eq.+33611111111"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "user-1"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("phone_number", "eq.+33622222222"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = Arc::new(SupabaseClient::new(&server.uri(), "k", 5).unwrap());
        let repo = UsersRepository::new(client);

        assert_eq!(
            repo.find_id_by_phone("+33611111111").await.unwrap(),
            Some("user-1".to_string())
        );
        assert!(!repo.exists_by_phone("+33622222222").await.unwrap());
    }
}
