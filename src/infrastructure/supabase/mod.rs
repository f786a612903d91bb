// infrastructure/supabase/mod.rs
//! Client PostgREST minimal pour Supabase.
//!
//! Les requêtes sont construites avec [`TableQuery`] puis exécutées par
//! une des opérations terminales (`execute`, `insert`, `upsert`, `update`).

use crate::utils::error::{AppError, Result};
use reqwest::{Client as HttpClient, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client Supabase (API REST)
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(url: &str, api_key: &str, timeout_seconds: u64) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("Client HTTP Supabase: {}", e)))?;

        Ok(Self {
            http_client: Arc::new(http_client),
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Démarrer une requête sur une table
    pub fn from(&self, table: &str) -> TableQuery<'_> {
        TableQuery {
            client: self,
            table: table.to_string(),
            columns: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Appeler une fonction SQL exposée (`/rest/v1/rpc/{function}`)
    pub async fn rpc(&self, function: &str, params: &Value) -> Result<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        let request = self.authorized(self.http_client.post(url)).json(params);

        self.send(request).await
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::Database(format!("{}: {}", status.as_u16(), body)));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| AppError::ParseError(e.to_string()))
    }
}

/// Requête PostgREST en cours de construction
pub struct TableQuery<'a> {
    client: &'a SupabaseClient,
    table: String,
    columns: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl<'a> TableQuery<'a> {
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    /// Filtre d'égalité (`col=eq.valeur`)
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn order(mut self, column: &str, descending: bool) -> Self {
        let direction = if descending { "desc" } else { "asc" };
        self.order = Some(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 3);
        if let Some(columns) = &self.columns {
            params.push(("select".to_string(), columns.clone()));
        }
        params.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Lecture (`GET`)
    pub async fn execute(self) -> Result<Vec<Value>> {
        debug!("Supabase GET {} {:?}", self.table, self.filters);
        let request = self
            .client
            .authorized(self.client.http_client.get(self.client.table_url(&self.table)))
            .query(&self.query_params());

        rows(self.client.send(request).await?)
    }

    /// Insertion (`POST`), renvoie les lignes créées
    pub async fn insert(self, payload: &Value) -> Result<Vec<Value>> {
        debug!("Supabase INSERT {}", self.table);
        let request = self
            .client
            .authorized(self.client.http_client.post(self.client.table_url(&self.table)))
            .header("Prefer", "return=representation")
            .json(payload);

        rows(self.client.send(request).await?)
    }

    /// Insertion ou fusion sur la clé primaire
    pub async fn upsert(self, payload: &Value) -> Result<Vec<Value>> {
        debug!("Supabase UPSERT {}", self.table);
        let request = self
            .client
            .authorized(self.client.http_client.post(self.client.table_url(&self.table)))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(payload);

        rows(self.client.send(request).await?)
    }

    /// Mise à jour (`PATCH`) des lignes correspondant aux filtres
    pub async fn update(self, payload: &Value) -> Result<Vec<Value>> {
        debug!("Supabase UPDATE {} {:?}", self.table, self.filters);
        let request = self
            .client
            .authorized(self.client.http_client.patch(self.client.table_url(&self.table)))
            .header("Prefer", "return=representation")
            .query(&self.query_params())
            .json(payload);

        rows(self.client.send(request).await?)
    }
}

/// PostgREST renvoie un tableau (ou rien avec `return=minimal`)
fn rows(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        Value::Object(_) => Ok(vec![value]),
        other => Err(AppError::ParseError(format!(
            "Réponse Supabase inattendue: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_select_sends_filters_order_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/messages"))
            .and(header("apikey", "test-key"))
            .and(header("Authorization", "Bearer test-key"))
            .and(query_param("select", "content,direction,created_at"))
            .and(query_param("phone_number", "eq.+33600000000"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"content": "Salut", "direction": "incoming"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "test-key", 5).unwrap();
        let rows = client
            .from("messages")
            .select("content,direction,created_at")
            .eq("phone_number", "+33600000000")
            .order("created_at", true)
            .limit(20)
            .execute()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["content"], "Salut");
    }

    #[tokio::test]
    async fn test_upsert_asks_for_merge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/users"))
            .and(header("Prefer", "resolution=merge-duplicates,return=representation"))
            .and(body_json(json!({"id": "u1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": "u1"}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "test-key", 5).unwrap();
        let rows = client.from("users").upsert(&json!({"id": "u1"})).await.unwrap();

        assert_eq!(rows, vec![json!({"id": "u1"})]);
    }

    #[tokio::test]
    async fn test_update_applies_filters() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/sessions"))
            .and(query_param("id", "eq.u1_1700000000"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "test-key", 5).unwrap();
        let rows = client
            .from("sessions")
            .eq("id", "u1_1700000000")
            .update(&json!({"status": "closed"}))
            .await
            .unwrap();

        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_becomes_database_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "test-key", 5).unwrap();
        let err = client.from("users").execute().await.unwrap_err();

        match err {
            AppError::Database(message) => {
                assert!(message.starts_with("401"));
                assert!(message.contains("JWT expired"));
            }
            other => panic!("erreur inattendue: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rpc_posts_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/execute_sql"))
            .and(body_json(json!({"query": "SELECT 1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"total": 1}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "test-key", 5).unwrap();
        let value = client.rpc("execute_sql", &json!({"query": "SELECT 1"})).await.unwrap();

        assert_eq!(value, json!([{"total": 1}]));
    }
}
