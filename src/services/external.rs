// services/external.rs
use crate::models::RouteOutcome;
use crate::utils::error::{AppError, Result};
use crate::utils::truncate_string;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Client de la fonction distante de génération de profils
pub struct ProfileGeneratorClient {
    http_client: Arc<HttpClient>,
    url: String,
    function_key: Option<String>,
}

impl ProfileGeneratorClient {
    pub fn new(url: &str, function_key: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("Client HTTP profile generator: {}", e)))?;

        Ok(Self {
            http_client: Arc::new(http_client),
            url: url.to_string(),
            function_key,
        })
    }

    /// URL appelée, avec la clé de fonction en paramètre `code`
    pub fn processor_url(&self) -> String {
        match &self.function_key {
            Some(key) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}code={}", self.url, separator, urlencoding::encode(key))
            }
            None => self.url.clone(),
        }
    }

    /// Envoyer un transcript au générateur de profils
    ///
    /// Les échecs sont renvoyés dans le [`RouteOutcome`], jamais en erreur.
    pub async fn send(&self, payload: &Value) -> RouteOutcome {
        info!("[HTTP] Envoi au processeur de profil: {}", self.url);
        info!("[HTTP] Données: {}", truncate_string(&payload.to_string(), 200));

        let response = match self
            .http_client
            .post(self.processor_url())
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("[HTTP] Erreur réseau: {}", e);
                return RouteOutcome::failed(format!("Erreur de communication: {}", e));
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!("[HTTP] Requête réussie: {}", status.as_u16());
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => RouteOutcome::ok(format!(
                    "Traitement réussi: {}",
                    truncate_string(&body.to_string(), 100)
                )),
                Err(_) => RouteOutcome::ok(format!(
                    "Traitement réussi avec statut: {}",
                    status.as_u16()
                )),
            }
        } else {
            error!("[HTTP] Échec de la requête: {}", status.as_u16());
            error!("[HTTP] Réponse: {}", truncate_string(&text, 500));
            RouteOutcome::failed(format!(
                "Échec du traitement: HTTP {} - {}",
                status.as_u16(),
                text.chars().take(100).collect::<String>()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_processor_url_encodes_key() {
        let client = ProfileGeneratorClient::new(
            "https://func.example.net/api/profile-generator",
            Some("a/b=c".to_string()),
            5,
        )
        .unwrap();

        assert_eq!(
            client.processor_url(),
            "https://func.example.net/api/profile-generator?code=a%2Fb%3Dc"
        );
    }

    #[tokio::test]
    async fn test_success_with_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/profile-generator"))
            .and(query_param("code", "cle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": "marie"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProfileGeneratorClient::new(
            &format!("{}/api/profile-generator", server.uri()),
            Some("cle".to_string()),
            5,
        )
        .unwrap();
        let outcome = client.send(&json!({"call_metadata": {}})).await;

        assert!(outcome.success);
        assert!(outcome.message.starts_with("Traitement réussi: "));
        assert!(outcome.message.contains("marie"));
    }

    #[tokio::test]
    async fn test_http_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = ProfileGeneratorClient::new(&server.uri(), None, 5).unwrap();
        let outcome = client.send(&json!({})).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Échec du traitement: HTTP 500 - boom");
    }
}
