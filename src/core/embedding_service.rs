// core/embedding_service.rs
use crate::infrastructure::database::Database;
use crate::infrastructure::llm::EmbeddingModel;
use crate::models::{
    BatchItem, BatchReport, EmbeddingRequest, EmbeddingResponse, ProfileType, StorageResult,
    StorageStatus,
};
use crate::utils::{
    error::{AppError, Result},
    first_missing_field, is_truthy, now_iso, round_to, value_to_string,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub const EMBEDDING_FAILED: &str = "Impossible de générer l'embedding";

const REQUIRED_FIELDS: [&str; 4] = ["user_id", "profile_type", "profile_id", "text"];

/// Génération et stockage des embeddings de profils
pub struct EmbeddingService {
    db: Database,
    embedder: Arc<dyn EmbeddingModel>,
}

impl EmbeddingService {
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self { db, embedder }
    }

    /// Valide le corps de `POST /api/embeddings/generate`
    pub fn parse_request(body: &Value) -> Result<EmbeddingRequest> {
        if let Some(field) = first_missing_field(body, &REQUIRED_FIELDS) {
            return Err(AppError::Validation(format!("Le champ '{}' est requis", field)));
        }

        let profile_type = body["profile_type"]
            .as_str()
            .and_then(ProfileType::parse)
            .ok_or_else(|| {
                AppError::Validation(
                    "Le type de profil doit être 'personal' ou 'desired'".to_string(),
                )
            })?;

        Ok(EmbeddingRequest {
            user_id: value_to_string(&body["user_id"]),
            profile_type,
            profile_id: value_to_string(&body["profile_id"]),
            text: value_to_string(&body["text"]),
        })
    }

    /// Embedding d'un texte, `None` si le texte est vide ou si le modèle échoue
    pub async fn generate_embedding(&self, text: &str) -> Option<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            warn!("Texte vide, impossible de générer un embedding");
            return None;
        }

        let start = Instant::now();
        match self.embedder.embed(text).await {
            Ok(embedding) => {
                info!(
                    "Embedding généré en {:.2}s ({} dimensions)",
                    start.elapsed().as_secs_f64(),
                    embedding.len()
                );
                Some(embedding)
            }
            Err(e) => {
                error!("Erreur lors de la génération de l'embedding: {}", e);
                None
            }
        }
    }

    /// Met à jour l'embedding existant du profil, sinon en crée un
    pub async fn store_embedding(
        &self,
        user_id: &str,
        kind: ProfileType,
        profile_id: &str,
        embedding: &[f32],
    ) -> StorageResult {
        let stored = async {
            match self.db.embeddings.find_id(profile_id, kind).await? {
                Some(id) => {
                    self.db.embeddings.update_vector(&id, embedding).await?;
                    info!("Embedding mis à jour pour le profil {} ({})", profile_id, kind.as_str());
                    Ok::<_, AppError>(StorageResult {
                        status: StorageStatus::Updated,
                        id: Some(id),
                        message: None,
                    })
                }
                None => {
                    let id = self
                        .db
                        .embeddings
                        .insert(user_id, kind, profile_id, embedding)
                        .await?;
                    info!("Nouvel embedding créé pour le profil {} ({})", profile_id, kind.as_str());
                    Ok(StorageResult {
                        status: StorageStatus::Created,
                        id,
                        message: None,
                    })
                }
            }
        };

        stored.await.unwrap_or_else(|e| {
            error!("Erreur lors du stockage de l'embedding: {}", e);
            StorageResult::error(e.to_string())
        })
    }

    pub async fn generate_for_profile(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        let start = Instant::now();

        let embedding = self
            .generate_embedding(&request.text)
            .await
            .ok_or_else(|| AppError::Internal(EMBEDDING_FAILED.to_string()))?;
        let storage = self
            .store_embedding(
                &request.user_id,
                request.profile_type,
                &request.profile_id,
                &embedding,
            )
            .await;

        Ok(EmbeddingResponse {
            user_id: request.user_id.clone(),
            profile_type: request.profile_type,
            profile_id: request.profile_id.clone(),
            embedding_status: storage.status,
            dimensions: embedding.len(),
            processing_time_seconds: round_to(start.elapsed().as_secs_f64(), 3),
            embedding_id: storage.id,
        })
    }

    /// Texte à encoder pour un profil
    ///
    /// Le résumé stocké est privilégié, sinon les champs sont assemblés.
    pub fn profile_text(kind: ProfileType, profile: &Value) -> String {
        if let Some(text) = profile.get(kind.result_key()).filter(|t| is_truthy(t)) {
            return value_to_string(text);
        }

        let field = |key: &str| profile.get(key).map(value_to_string).unwrap_or_default();
        match kind {
            ProfileType::Personal => format!(
                "Nom: {}, Âge: {}, Localisation: {}, Bio: {}, Activités: {}",
                field("name"),
                field("age"),
                field("location"),
                field("bio"),
                field("hobbies_activities")
            ),
            ProfileType::Desired => format!(
                "Âge recherché: {}, Localisation: {}, Description: {}, Activités: {}",
                field("age"),
                field("location_preference"),
                field("bio"),
                field("hobbies_activities")
            ),
        }
    }

    /// Embeddings des deux profils d'un utilisateur
    pub async fn generate_for_user(&self, user_id: &str) -> Result<Value> {
        let mut results = Map::new();
        results.insert("user_id".to_string(), json!(user_id));

        for kind in [ProfileType::Personal, ProfileType::Desired] {
            let result = match self.db.profiles.find_by_user(kind, user_id).await? {
                Some(profile) => {
                    let profile_id = profile.get("id").cloned().unwrap_or(Value::Null);
                    let text = Self::profile_text(kind, &profile);

                    match self.generate_embedding(&text).await {
                        Some(embedding) => {
                            let storage = self
                                .store_embedding(user_id, kind, &value_to_string(&profile_id), &embedding)
                                .await;
                            let mut result = json!({
                                "status": storage.status,
                                "profile_id": profile_id,
                                "dimensions": embedding.len(),
                            });
                            if let Some(id) = storage.id {
                                result["embedding_id"] = id;
                            }
                            result
                        }
                        None => json!({ "status": "error", "message": EMBEDDING_FAILED }),
                    }
                }
                None => json!({ "status": "not_found" }),
            };
            results.insert(kind.result_key().to_string(), result);
        }

        Ok(Value::Object(results))
    }

    /// Traite une liste d'utilisateurs, dans la limite donnée
    pub async fn batch(&self, user_ids: &[String], limit: Option<usize>) -> BatchReport {
        let limit = limit.unwrap_or(user_ids.len());
        let mut report = BatchReport {
            total_users: user_ids.len(),
            ..Default::default()
        };

        for user_id in user_ids.iter().take(limit) {
            report.processed_count += 1;
            match self.generate_for_user(user_id).await {
                Ok(details) => {
                    report.successful_count += 1;
                    report.results.push(BatchItem {
                        user_id: user_id.clone(),
                        status: "success".to_string(),
                        details: Some(details),
                        message: None,
                    });
                }
                Err(e) => {
                    error!("Erreur pour l'utilisateur {}: {}", user_id, e);
                    report.error_count += 1;
                    report.results.push(BatchItem {
                        user_id: user_id.clone(),
                        status: "error".to_string(),
                        details: None,
                        message: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            "Lot terminé: {}/{} utilisateurs traités, {} erreurs",
            report.processed_count, report.total_users, report.error_count
        );
        report
    }

    /// État de Supabase, du modèle d'embedding et statistiques
    pub async fn health(&self) -> Value {
        let start = Instant::now();
        let mut healthy = true;

        let probe_start = Instant::now();
        let supabase = match self.db.embeddings.probe().await {
            Ok(()) => json!({
                "status": "connected",
                "response_time": round_to(probe_start.elapsed().as_secs_f64(), 3),
            }),
            Err(e) => {
                healthy = false;
                json!({ "status": "error", "message": e.to_string() })
            }
        };

        let probe_start = Instant::now();
        let azure_openai = match self.embedder.embed("Test de connexion").await {
            Ok(embedding) if !embedding.is_empty() => json!({
                "status": "connected",
                "model": self.embedder.model_name(),
                "dimensions": embedding.len(),
                "response_time": round_to(probe_start.elapsed().as_secs_f64(), 3),
            }),
            Ok(_) => {
                healthy = false;
                json!({ "status": "error", "message": "Réponse invalide d'Azure OpenAI" })
            }
            Err(e) => {
                healthy = false;
                json!({ "status": "error", "message": e.to_string() })
            }
        };

        let stats = match self.db.embeddings.stats().await {
            Ok(Some(stats)) => stats,
            Ok(None) => json!({}),
            Err(e) => json!({ "error": e.to_string() }),
        };

        json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "timestamp": now_iso(),
            "services": {
                "supabase": supabase,
                "azure_openai": azure_openai,
            },
            "stats": stats,
            "response_time": round_to(start.elapsed().as_secs_f64(), 3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FixedEmbedder;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(uri: &str, embedder: FixedEmbedder) -> EmbeddingService {
        EmbeddingService::new(Database::new_test(uri), Arc::new(embedder))
    }

    #[test]
    fn test_parse_request_validation() {
        let err = EmbeddingService::parse_request(&json!({"user_id": "u1"})).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Le champ 'profile_type' est requis"));

        let err = EmbeddingService::parse_request(&json!({
            "user_id": "u1", "profile_type": "other", "profile_id": "p1", "text": "x"
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("'personal' ou 'desired'")));

        let request = EmbeddingService::parse_request(&json!({
            "user_id": "u1", "profile_type": "desired", "profile_id": "p1", "text": "x"
        }))
        .unwrap();
        assert_eq!(request.profile_type, ProfileType::Desired);
    }

    #[test]
    fn test_profile_text_fallback() {
        let text = EmbeddingService::profile_text(
            ProfileType::Personal,
            &json!({"name": "Marie", "age": 29, "location": "Lyon"}),
        );
        assert_eq!(text, "Nom: Marie, Âge: 29, Localisation: Lyon, Bio: , Activités: ");

        let text = EmbeddingService::profile_text(
            ProfileType::Desired,
            &json!({"desired_profile": "Quelqu'un de drôle", "age": "30-40"}),
        );
        assert_eq!(text, "Quelqu'un de drôle");
    }

    #[tokio::test]
    async fn test_blank_text_has_no_embedding() {
        let service = service("http://127.0.0.1:9", FixedEmbedder::new(3));
        assert!(service.generate_embedding("   ").await.is_none());
        assert_eq!(service.generate_embedding(" bonjour ").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_store_embedding_updates_existing_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profile_embeddings"))
            .and(query_param("profile_id", "eq.p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 12}])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/profile_embeddings"))
            .and(query_param("id", "eq.12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 12}])))
            .expect(1)
            .mount(&server)
            .await;

        let result = service(&server.uri(), FixedEmbedder::new(3))
            .store_embedding("u1", ProfileType::Personal, "p1", &[0.1, 0.2, 0.3])
            .await;

        assert_eq!(result.status, StorageStatus::Updated);
        assert_eq!(result.id, Some(json!(12)));
    }

    #[tokio::test]
    async fn test_store_embedding_creates_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profile_embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profile_embeddings"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 99}])))
            .mount(&server)
            .await;

        let result = service(&server.uri(), FixedEmbedder::new(3))
            .store_embedding("u1", ProfileType::Desired, "p1", &[0.1])
            .await;

        assert_eq!(result.status, StorageStatus::Created);
        assert_eq!(result.id, Some(json!(99)));
    }

    #[tokio::test]
    async fn test_generate_for_user_reports_each_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/personal_profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "p1", "name": "Marie"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/desired_profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profile_embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profile_embeddings"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 5}])))
            .mount(&server)
            .await;

        let results = service(&server.uri(), FixedEmbedder::new(4))
            .generate_for_user("u1")
            .await
            .unwrap();

        assert_eq!(results["user_id"], "u1");
        assert_eq!(results["personal_profile"]["status"], "created");
        assert_eq!(results["personal_profile"]["dimensions"], 4);
        assert_eq!(results["personal_profile"]["embedding_id"], 5);
        assert_eq!(results["desired_profile"]["status"], "not_found");
    }

    #[tokio::test]
    async fn test_batch_counts_errors_and_honours_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("indisponible"))
            .mount(&server)
            .await;

        let ids = vec!["u1".to_string(), "u2".to_string(), "u3".to_string()];
        let report = service(&server.uri(), FixedEmbedder::new(4)).batch(&ids, Some(2)).await;

        assert_eq!(report.total_users, 3);
        assert_eq!(report.processed_count, 2);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.successful_count, 0);
        assert_eq!(report.results[0].status, "error");
    }

    #[tokio::test]
    async fn test_health_is_degraded_when_embedding_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profile_embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"count": 3}])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/execute_sql"))
            .respond_with(ResponseTemplate::new(404).set_body_string("fonction inconnue"))
            .mount(&server)
            .await;

        let health = service(&server.uri(), FixedEmbedder::failing()).health().await;

        assert_eq!(health["status"], "degraded");
        assert_eq!(health["services"]["supabase"]["status"], "connected");
        assert_eq!(health["services"]["azure_openai"]["status"], "error");
        assert!(health["stats"]["error"].as_str().unwrap().contains("404"));
    }
}
