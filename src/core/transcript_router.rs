// core/transcript_router.rs
use crate::core::profile_generator::ProfileGenerator;
use crate::infrastructure::database::UsersRepository;
use crate::infrastructure::queue::TranscriptQueue;
use crate::models::{
    CallFeatures, CallMetadata, ConversationContent, Exchange, ExtractionError, RouteOutcome,
    TechnicalSettings, Transcriber,
};
use crate::services::ProfileGeneratorClient;
use crate::utils::{error::Result, now_iso, truncate_string, value_to_string};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub const QUEUED_MESSAGE: &str = "Transcript envoyé à la file d'attente de mise à jour";
pub const MISSING_PHONE_MESSAGE: &str = "Numéro de téléphone manquant";

/// Extrait les données utiles d'un webhook VAPI de fin d'appel
pub fn extract_call_features(payload: &Value) -> std::result::Result<CallFeatures, ExtractionError> {
    let message = payload.get("message").ok_or_else(|| {
        ExtractionError::new("Structure JSON invalide: champ 'message' manquant", None)
    })?;

    let missing_field = |key: &str| {
        let message_keys = match message.as_object() {
            Some(object) => json!(object.keys().collect::<Vec<_>>()),
            None => json!("not a dict"),
        };
        let top_level_keys = payload
            .as_object()
            .map(|object| object.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        ExtractionError::new(
            format!(
                "Erreur lors de l'extraction des features: champ manquant '{}'",
                key
            ),
            Some(json!({
                "received_data": {
                    "top_level_keys": top_level_keys,
                    "message_keys": message_keys,
                }
            })),
        )
    };
    let require = |value: &Value, path: &[&str]| -> std::result::Result<Value, ExtractionError> {
        let mut current = value;
        for key in path {
            current = current.get(*key).ok_or_else(|| missing_field(*key))?;
        }
        Ok(current.clone())
    };

    let call_id = require(message, &["call", "id"])?;
    let start_time = require(message, &["startedAt"])?;
    let customer_phone = require(message, &["customer", "number"])?;
    let language = require(message, &["assistant", "transcriber", "language"])?;

    let structured_data = match message.get("analysis").and_then(|a| a.get("structuredData")) {
        Some(data) => data,
        None => {
            let message_keys = message
                .as_object()
                .map(|object| object.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            return Err(ExtractionError::new(
                "Données de conversation manquantes",
                Some(json!({
                    "message_keys": message_keys,
                    "analysis_present": message.get("analysis").is_some(),
                    "structuredData_present": false,
                })),
            ));
        }
    };

    let transcript = require(structured_data, &["transcript"])?;
    let structured_exchanges: Vec<Exchange> = serde_json::from_value(transcript).map_err(|e| {
        ExtractionError::new(
            format!("Erreur lors de l'extraction des features: {}", e),
            None,
        )
    })?;

    Ok(CallFeatures {
        call_metadata: CallMetadata {
            call_id: value_to_string(&call_id),
            start_time: value_to_string(&start_time),
            customer_phone: Some(value_to_string(&customer_phone)).filter(|phone| !phone.is_empty()),
        },
        technical_settings: TechnicalSettings {
            transcriber: Transcriber {
                language: value_to_string(&language),
            },
        },
        conversation_content: ConversationContent { structured_exchanges },
    })
}

/// Destination des transcripts de nouveaux utilisateurs
pub enum ProfileGeneratorTarget {
    /// Fonction HTTP distante
    Remote(ProfileGeneratorClient),
    /// Générateur du même processus
    Local(Arc<ProfileGenerator>),
}

impl ProfileGeneratorTarget {
    pub async fn send(&self, payload: &Value) -> RouteOutcome {
        match self {
            ProfileGeneratorTarget::Remote(client) => client.send(payload).await,
            ProfileGeneratorTarget::Local(generator) => {
                let features: CallFeatures = match serde_json::from_value(payload.clone()) {
                    Ok(features) => features,
                    Err(e) => return RouteOutcome::failed(format!("Échec du traitement: {}", e)),
                };

                let result = generator.process_vapi_data(&features).await;
                let stored = result["storage_status"]["success"].as_bool().unwrap_or(false);
                let summary = truncate_string(&result.to_string(), 100);
                if stored {
                    RouteOutcome::ok(format!("Traitement réussi: {}", summary))
                } else {
                    RouteOutcome::failed(format!("Échec du traitement: {}", summary))
                }
            }
        }
    }
}

/// Dernier routage effectué
#[derive(Debug, Clone, Serialize)]
pub struct RoutingStatus {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "détails")]
    pub details: String,
}

impl RoutingStatus {
    fn from_outcome(outcome: &RouteOutcome) -> Self {
        let kind = if outcome.message.contains("file d'attente") {
            "utilisateur_existant"
        } else {
            "nouvel_utilisateur"
        };
        Self {
            kind: kind.to_string(),
            details: outcome.message.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct WebhookState {
    last_processed: Option<Value>,
    last_routing: Option<RoutingStatus>,
}

/// Réponse du webhook après traitement
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub processed_data: Value,
    pub message: String,
    pub processor_status: String,
    pub processor_success: bool,
}

/// Routage des transcripts VAPI
///
/// Un numéro connu part dans la file de mise à jour, un numéro inconnu
/// est envoyé au générateur de profils.
pub struct TranscriptRouter {
    users: UsersRepository,
    queue: Arc<dyn TranscriptQueue>,
    generator: ProfileGeneratorTarget,
    state: RwLock<WebhookState>,
}

impl TranscriptRouter {
    pub fn new(
        users: UsersRepository,
        queue: Arc<dyn TranscriptQueue>,
        generator: ProfileGeneratorTarget,
    ) -> Self {
        Self {
            users,
            queue,
            generator,
            state: RwLock::new(WebhookState::default()),
        }
    }

    pub async fn route_transcript(&self, processed_data: &Value) -> Result<RouteOutcome> {
        let phone_number = processed_data
            .get("call_metadata")
            .and_then(|metadata| metadata.get("customer_phone"))
            .and_then(Value::as_str)
            .filter(|phone| !phone.is_empty());

        let Some(phone_number) = phone_number else {
            warn!("Routage impossible: numéro de téléphone manquant");
            return Ok(RouteOutcome::failed(MISSING_PHONE_MESSAGE));
        };

        if self.users.exists_by_phone(phone_number).await? {
            info!(
                "👤 Utilisateur existant {}, envoi vers la file {}",
                phone_number,
                self.queue.name()
            );
            self.queue.push(processed_data).await?;
            Ok(RouteOutcome::ok(QUEUED_MESSAGE))
        } else {
            info!("🆕 Nouvel utilisateur {}, envoi au générateur de profils", phone_number);
            Ok(self.generator.send(processed_data).await)
        }
    }

    /// Traite un webhook VAPI complet et mémorise son résultat
    pub async fn process_webhook(&self, payload: &Value) -> Result<WebhookResponse> {
        let processed_data = match extract_call_features(payload) {
            Ok(features) => serde_json::to_value(&features)?,
            Err(extraction_error) => {
                error!("Extraction des features impossible: {}", extraction_error.error);
                serde_json::to_value(&extraction_error)?
            }
        };

        let outcome = self.route_transcript(&processed_data).await?;
        info!(
            "Routage terminé (succès: {}): {}",
            outcome.success, outcome.message
        );

        {
            let mut state = self.state.write().await;
            state.last_processed = Some(processed_data.clone());
            state.last_routing = Some(RoutingStatus::from_outcome(&outcome));
        }

        Ok(WebhookResponse {
            processed_data,
            message: "Données traitées avec succès".to_string(),
            processor_status: outcome.message,
            processor_success: outcome.success,
        })
    }

    /// Dernier webhook traité et son routage
    pub async fn last_state(&self) -> Value {
        let state = self.state.read().await;
        json!({
            "dernière_requête_traitée": state
                .last_processed
                .clone()
                .unwrap_or_else(|| json!("Aucune donnée reçue")),
            "statut_routage": state
                .last_routing
                .as_ref()
                .map(|status| json!(status))
                .unwrap_or_else(|| json!("Aucun routage effectué")),
        })
    }

    /// Envoie un transcript fictif au générateur de profils
    pub async fn test_processor(&self) -> (bool, Value) {
        let timestamp = chrono::Utc::now().timestamp();
        let test_message = json!({
            "transcript_id": format!("test-{}", timestamp),
            "call_metadata": {
                "call_id": format!("test-call-{}", timestamp),
                "start_time": now_iso(),
            },
            "conversation_content": {
                "structured_exchanges": [
                    {"speaker": "user", "text": "Test message", "timestamp": "00:00:01"}
                ]
            },
            "technical_settings": {
                "transcriber": {"language": "fr-FR"}
            }
        });

        let outcome = self.generator.send(&test_message).await;
        let body = json!({
            "status": if outcome.success { "success" } else { "error" },
            "sent_message": test_message,
            "processor_response": outcome.message,
        });
        (outcome.success, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::queue::MemoryQueue;
    use crate::infrastructure::SupabaseClient;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vapi_payload(phone: &str) -> Value {
        json!({
            "message": {
                "type": "end-of-call-report",
                "call": {"id": "call-42"},
                "startedAt": "2025-03-01T10:00:00.000Z",
                "customer": {"number": phone},
                "assistant": {"transcriber": {"language": "fr"}},
                "analysis": {
                    "structuredData": {
                        "transcript": [
                            {"speaker": "agent", "text": "Salut, moi c'est Jackie !", "timestamp": "00:00:00"},
                            {"speaker": "user", "text": "Je m'appelle Marie", "timestamp": "00:00:03"}
                        ]
                    }
                }
            }
        })
    }

    async fn router(server: &MockServer, generator_uri: &str) -> (TranscriptRouter, Arc<MemoryQueue>) {
        let client = Arc::new(SupabaseClient::new(&server.uri(), "k", 5).unwrap());
        let queue = Arc::new(MemoryQueue::new("test-queue"));
        let generator = ProfileGeneratorTarget::Remote(
            ProfileGeneratorClient::new(&format!("{}/api/profile-generator", generator_uri), None, 5)
                .unwrap(),
        );
        (
            TranscriptRouter::new(UsersRepository::new(client), queue.clone(), generator),
            queue,
        )
    }

    #[test]
    fn test_extract_call_features() {
        let features = extract_call_features(&vapi_payload("+33612345678")).unwrap();

        assert_eq!(features.call_metadata.call_id, "call-42");
        assert_eq!(features.call_metadata.customer_phone.as_deref(), Some("+33612345678"));
        assert_eq!(features.technical_settings.transcriber.language, "fr");
        assert_eq!(features.conversation_content.structured_exchanges.len(), 2);
    }

    #[test]
    fn test_extract_without_message() {
        let err = extract_call_features(&json!({"call": {}})).unwrap_err();
        assert_eq!(err.error, "Structure JSON invalide: champ 'message' manquant");
        assert_eq!(err.status, "error");
    }

    #[test]
    fn test_extract_without_structured_data() {
        let mut payload = vapi_payload("+33612345678");
        payload["message"]["analysis"] = json!({"summary": "court"});

        let err = extract_call_features(&payload).unwrap_err();
        assert_eq!(err.error, "Données de conversation manquantes");
        let details = err.details.unwrap();
        assert_eq!(details["analysis_present"], true);
        assert_eq!(details["structuredData_present"], false);
    }

    #[test]
    fn test_extract_missing_field_is_named() {
        let mut payload = vapi_payload("+33612345678");
        payload["message"].as_object_mut().unwrap().remove("customer");

        let err = extract_call_features(&payload).unwrap_err();
        assert_eq!(
            err.error,
            "Erreur lors de l'extraction des features: champ manquant 'customer'"
        );
        assert_eq!(err.details.unwrap()["received_data"]["top_level_keys"], json!(["message"]));
    }

    #[tokio::test]
    async fn test_existing_user_goes_to_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("phone_number", "eq.+33612345678"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "user-1"}])))
            .mount(&server)
            .await;

        let (router, queue) = router(&server, &server.uri()).await;
        let response = router.process_webhook(&vapi_payload("+33612345678")).await.unwrap();

        assert!(response.processor_success);
        assert_eq!(response.processor_status, QUEUED_MESSAGE);
        assert_eq!(queue.len().await.unwrap(), 1);

        let state = router.last_state().await;
        assert_eq!(state["statut_routage"]["type"], "utilisateur_existant");
        assert_eq!(
            state["dernière_requête_traitée"]["call_metadata"]["call_id"],
            "call-42"
        );
    }

    #[tokio::test]
    async fn test_new_user_goes_to_generator() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/profile-generator"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": "marie"})))
            .expect(1)
            .mount(&server)
            .await;

        let (router, queue) = router(&server, &server.uri()).await;
        let response = router.process_webhook(&vapi_payload("+33699999999")).await.unwrap();

        assert!(response.processor_success);
        assert!(response.processor_status.starts_with("Traitement réussi"));
        assert_eq!(queue.len().await.unwrap(), 0);

        let state = router.last_state().await;
        assert_eq!(state["statut_routage"]["type"], "nouvel_utilisateur");
    }

    #[tokio::test]
    async fn test_invalid_payload_is_not_routed() {
        let server = MockServer::start().await;
        let (router, _) = router(&server, &server.uri()).await;

        let response = router.process_webhook(&json!({"foo": "bar"})).await.unwrap();

        assert!(!response.processor_success);
        assert_eq!(response.processor_status, MISSING_PHONE_MESSAGE);
        assert_eq!(response.processed_data["status"], "error");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initial_state() {
        let server = MockServer::start().await;
        let (router, _) = router(&server, &server.uri()).await;

        let state = router.last_state().await;
        assert_eq!(state["dernière_requête_traitée"], "Aucune donnée reçue");
        assert_eq!(state["statut_routage"], "Aucun routage effectué");
    }

    #[tokio::test]
    async fn test_processor_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/profile-generator"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let (router, _) = router(&server, &server.uri()).await;
        let (success, body) = router.test_processor().await;

        assert!(!success);
        assert_eq!(body["status"], "error");
        assert_eq!(body["sent_message"]["technical_settings"]["transcriber"]["language"], "fr-FR");
        assert!(body["processor_response"]
            .as_str()
            .unwrap()
            .starts_with("Échec du traitement: HTTP 500"));
    }
}
