// core/profile_generator.rs
use crate::core::prompts::{self, fill};
use crate::infrastructure::database::Database;
use crate::infrastructure::llm::{CompletionOptions, LanguageModel, PromptMessage};
use crate::models::{CallFeatures, Exchange, FormattedTranscript, ProfileType};
use crate::utils::{
    error::{AppError, Result},
    estimate_tokens, json_string_if_truthy, now_iso, now_utc_compact, value_to_string,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

const DEFAULT_USER_NAME: &str = "Utilisateur";
const NAME_MARKERS: [&str; 3] = ["m'appelle", "m’appelle", "my name is"];

/// Analyse d'un transcript par le modèle de langage
///
/// Les compteurs de tokens sont des estimations (4 caractères par token)
/// cumulées sur toutes les requêtes de l'analyseur.
pub struct TranscriptAnalyzer {
    llm: Arc<dyn LanguageModel>,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
}

impl TranscriptAnalyzer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            total_input_tokens: 0,
            total_output_tokens: 0,
        }
    }

    fn log_prompt_stats(&mut self, prompt: &str, response: &str) {
        let input_tokens = estimate_tokens(prompt);
        let output_tokens = estimate_tokens(response);
        self.total_input_tokens += input_tokens;
        self.total_output_tokens += output_tokens;

        info!(
            "Tokens estimés: ~{} en entrée, ~{} en sortie, ~{} au total",
            input_tokens,
            output_tokens,
            input_tokens + output_tokens
        );
    }

    /// Prénom détecté dans la présentation de l'utilisateur
    pub fn detect_user_name(exchanges: &[Exchange]) -> String {
        exchanges
            .iter()
            .filter(|exchange| exchange.is_user())
            .find_map(|exchange| {
                let text = exchange.text.to_lowercase();
                NAME_MARKERS.iter().find_map(|marker| {
                    let (_, rest) = text.split_once(marker)?;
                    rest.split_whitespace()
                        .next()
                        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
                        .filter(|word| !word.is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_string())
    }

    /// Transforme les données VAPI au format attendu par l'analyse
    pub fn format_transcript_for_analysis(&self, features: &CallFeatures) -> FormattedTranscript {
        let exchanges = &features.conversation_content.structured_exchanges;

        FormattedTranscript {
            conversation_id: features.call_metadata.call_id.clone(),
            user_name: Self::detect_user_name(exchanges),
            timestamp: features.call_metadata.start_time.clone(),
            customer_phone: features.call_metadata.customer_phone.clone(),
            transcript: exchanges.clone(),
            detected_languages: vec![features.technical_settings.transcriber.language.clone()],
        }
    }

    fn conversation_text(transcript: &FormattedTranscript) -> String {
        transcript
            .transcript
            .iter()
            .map(|exchange| {
                let speaker = if exchange.speaker == "agent" { "Assistant" } else { "Utilisateur" };
                format!("{}: {}", speaker, exchange.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn user_lines(transcript: &FormattedTranscript) -> String {
        transcript
            .transcript
            .iter()
            .filter(|exchange| exchange.is_user())
            .map(|exchange| format!("[{}] {}", exchange.timestamp_text(), exchange.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn ask(&mut self, system: &str, prompt: String, options: &CompletionOptions) -> Result<String> {
        let messages = [PromptMessage::system(system), PromptMessage::user(prompt.clone())];
        let response = self.llm.complete(&messages, options).await?;
        self.log_prompt_stats(&prompt, &response);
        Ok(response)
    }

    async fn extract(&mut self, system: &str, prompt: String) -> Result<Value> {
        let response = self.ask(system, prompt, &CompletionOptions::json()).await?;
        serde_json::from_str(&response).map_err(|e| AppError::ParseError(e.to_string()))
    }

    pub async fn extract_personal_profile(&mut self, transcript: &FormattedTranscript) -> Value {
        info!("Préparation des données du transcript...");
        let prompt = fill(
            prompts::PERSONAL_EXTRACTION,
            &[
                ("user_name", transcript.user_name.as_str()),
                ("conversation", Self::conversation_text(transcript).as_str()),
            ],
        );

        self.extract(prompts::PERSONAL_EXTRACTION_SYSTEM, prompt)
            .await
            .unwrap_or_else(|e| {
                error!("Erreur lors de l'extraction du profil personnel: {}", e);
                json!({ "name": transcript.user_name, "error": e.to_string() })
            })
    }

    pub async fn extract_desired_profile(&mut self, transcript: &FormattedTranscript) -> Value {
        let prompt = fill(
            prompts::DESIRED_EXTRACTION,
            &[("conversation", Self::conversation_text(transcript).as_str())],
        );

        self.extract(prompts::DESIRED_EXTRACTION_SYSTEM, prompt)
            .await
            .unwrap_or_else(|e| {
                error!("Erreur lors de l'extraction du profil recherché: {}", e);
                json!({ "name": null, "error": e.to_string() })
            })
    }

    async fn narrative(&mut self, system: &str, prompt: String) -> String {
        match self.ask(system, prompt, &CompletionOptions::default()).await {
            Ok(response) => response.trim().to_string(),
            Err(e) => {
                error!("Erreur lors de la génération du résumé: {}", e);
                format!("Erreur lors de la génération du résumé: {}", e)
            }
        }
    }

    pub async fn generate_personal_narrative(
        &mut self,
        personal_profile: &Value,
        transcript: &FormattedTranscript,
    ) -> String {
        let messages = format!(
            "\nMESSAGES DE L'UTILISATEUR (par ordre chronologique):\n{}\n",
            Self::user_lines(transcript)
        );
        let profile = serde_json::to_string_pretty(personal_profile).unwrap_or_default();
        let prompt = fill(
            prompts::PERSONAL_NARRATIVE,
            &[
                ("profile", profile.as_str()),
                ("messages", messages.as_str()),
                ("user_name", transcript.user_name.as_str()),
            ],
        );

        info!("Envoi du prompt pour la génération du résumé personnel");
        self.narrative(prompts::PERSONAL_NARRATIVE_SYSTEM, prompt).await
    }

    pub async fn generate_desired_narrative(
        &mut self,
        desired_profile: &Value,
        transcript: &FormattedTranscript,
    ) -> String {
        let profile = serde_json::to_string_pretty(desired_profile).unwrap_or_default();
        let prompt = fill(
            prompts::DESIRED_NARRATIVE,
            &[
                ("profile", profile.as_str()),
                ("messages", Self::user_lines(transcript).as_str()),
                ("user_name", transcript.user_name.as_str()),
            ],
        );

        info!("Envoi du prompt pour la génération du résumé des préférences");
        self.narrative(prompts::DESIRED_NARRATIVE_SYSTEM, prompt).await
    }

    /// Extrait les deux profils et leurs résumés
    pub async fn process_transcript(&mut self, transcript: &FormattedTranscript) -> Value {
        info!(
            "Début du traitement du transcript pour l'utilisateur: {}",
            transcript.user_name
        );

        info!("Extraction du profil personnel");
        let personal = self.extract_personal_profile(transcript).await;
        info!("Extraction du profil recherché");
        let desired = self.extract_desired_profile(transcript).await;

        info!("Génération du résumé personnel");
        let personal_narrative = self.generate_personal_narrative(&personal, transcript).await;
        let field = |profile: &Value, key: &str| profile.get(key).cloned().unwrap_or(Value::Null);
        let object = |profile: &Value, key: &str| profile.get(key).cloned().unwrap_or_else(|| json!({}));

        let personal_profile = json!({
            "name": transcript.user_name,
            "age": field(&personal, "age"),
            "location": field(&personal, "location"),
            "bio": personal_narrative,
            "relationship_looked_for": object(&personal, "relationship_looked_for"),
            "hobbies_activities": object(&personal, "hobbies_activities"),
            "main_aspects": object(&personal, "key_traits"),
        });

        info!("Génération du résumé des préférences");
        let desired_narrative = self.generate_desired_narrative(&desired, transcript).await;
        let desired_age = desired
            .get("age_range")
            .filter(|age| !age.is_null())
            .cloned()
            .unwrap_or_else(|| field(&desired, "age"));

        let desired_profile = json!({
            "name": field(&desired, "name"),
            "age": desired_age,
            "location_preference": field(&desired, "location_preference"),
            "bio": desired_narrative,
            "relationship_looked_for": object(&desired, "relationship_looked_for"),
            "hobbies_activities": object(&desired, "hobbies_activities"),
            "main_aspects": object(&desired, "main_aspects"),
        });

        json!({
            "conversation_id": transcript.conversation_id,
            "user_id": transcript.user_name.to_lowercase(),
            "phone_number": transcript.customer_phone,
            "personal_profile": personal_profile,
            "desired_profile": desired_profile,
            "transcript": transcript.transcript,
            "timestamp": now_utc_compact(),
            "token_usage": {
                "input_tokens": self.total_input_tokens,
                "output_tokens": self.total_output_tokens,
                "total_tokens": self.total_input_tokens + self.total_output_tokens,
            }
        })
    }
}

/// Génération de profils pour les nouveaux utilisateurs
pub struct ProfileGenerator {
    db: Database,
    llm: Arc<dyn LanguageModel>,
    last_generated: RwLock<Option<Value>>,
    last_input: RwLock<Option<Value>>,
}

impl ProfileGenerator {
    pub fn new(db: Database, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            db,
            llm,
            last_generated: RwLock::new(None),
            last_input: RwLock::new(None),
        }
    }

    /// Mémorise le dernier corps reçu par l'endpoint HTTP
    pub async fn remember_input(&self, body: &Value) {
        *self.last_input.write().await = Some(body.clone());
    }

    /// Analyse un appel VAPI, stocke les profils et mémorise le résultat
    pub async fn process_vapi_data(&self, features: &CallFeatures) -> Value {
        let mut analyzer = TranscriptAnalyzer::new(self.llm.clone());
        let transcript = analyzer.format_transcript_for_analysis(features);
        let mut result = analyzer.process_transcript(&transcript).await;

        let storage_status = self.store_profiles(&result).await;
        result["storage_status"] = storage_status;

        *self.last_generated.write().await = Some(result.clone());
        info!("Génération des profils terminée pour {}", transcript.user_name);
        result
    }

    /// Derniers profils générés
    pub async fn last_generated(&self) -> Option<Value> {
        self.last_generated.read().await.clone()
    }

    /// Réponse de `GET /api/profile-generator`
    pub async fn last_state(&self) -> Value {
        json!({
            "derniers_profils_générés": self
                .last_generated()
                .await
                .unwrap_or_else(|| json!("Aucun profil généré")),
            "données_entrée": self
                .last_input
                .read()
                .await
                .clone()
                .unwrap_or_else(|| json!("Aucune donnée d'entrée")),
        })
    }

    /// Stocke l'utilisateur, ses profils et la conversation
    pub async fn store_profiles(&self, profile_data: &Value) -> Value {
        let user_id = profile_data
            .get("user_id")
            .map(value_to_string)
            .unwrap_or_default();
        if user_id.is_empty() {
            return json!({
                "success": false,
                "message": "ID utilisateur manquant dans les données de profil",
                "details": "Le champ user_id est requis",
            });
        }

        let user_uuid = Uuid::new_v5(&Uuid::NAMESPACE_DNS, user_id.as_bytes()).to_string();
        let now = now_iso();

        let user = json!({
            "id": user_uuid,
            "phone_number": profile_data.get("phone_number").cloned().unwrap_or(Value::Null),
            "created_at": now,
            "last_active": now,
            "status": "active",
            "onboarding_completed": true,
        });
        match self.db.users.upsert(&user).await {
            Ok(rows) if !rows.is_empty() => {
                info!("Utilisateur {} inséré avec UUID {}", user_id, user_uuid);
            }
            Ok(_) => {
                let message = format!("Échec de l'insertion utilisateur {}", user_id);
                error!("Erreur insertion utilisateur: {}", message);
                return json!({
                    "success": false,
                    "message": format!("Échec insertion utilisateur: {}", message),
                    "details": message,
                });
            }
            Err(e) => {
                error!("Erreur insertion utilisateur: {}", e);
                return json!({
                    "success": false,
                    "message": format!("Échec insertion utilisateur: {}", e),
                    "details": e.to_string(),
                });
            }
        }

        match self.store_profile_rows(profile_data, &user_uuid, &now).await {
            Ok(details) => {
                info!(
                    "Profils et conversation stockés avec succès pour l'utilisateur {} (UUID: {})",
                    user_id, user_uuid
                );
                json!({
                    "success": true,
                    "message": "Profils et conversation stockés avec succès",
                    "details": details,
                })
            }
            Err(e) => {
                let message = format!("Erreur lors du stockage des profils: {}", e);
                error!("{}", message);
                json!({
                    "success": false,
                    "message": message,
                    "details": e.to_string(),
                })
            }
        }
    }

    async fn store_profile_rows(&self, profile_data: &Value, user_uuid: &str, now: &str) -> Result<Value> {
        let empty = json!({});
        let personal = profile_data.get("personal_profile").unwrap_or(&empty);
        let desired = profile_data.get("desired_profile").unwrap_or(&empty);
        let get = |profile: &Value, key: &str| profile.get(key).cloned().unwrap_or(Value::Null);

        let personal_row = json!({
            "id": Uuid::new_v4().to_string(),
            "user_id": user_uuid,
            "phone_number": get(personal, "phone_number"),
            "name": get(personal, "name"),
            "age": get(personal, "age"),
            "location": get(personal, "location"),
            "bio": get(personal, "bio"),
            "relationship_looked_for": json_string_if_truthy(personal.get("relationship_looked_for")),
            "hobbies_activities": json_string_if_truthy(personal.get("hobbies_activities")),
            "main_aspects": json_string_if_truthy(personal.get("main_aspects")),
            "created_at": now,
            "updated_at": now,
        });

        let desired_row = json!({
            "id": Uuid::new_v4().to_string(),
            "user_id": user_uuid,
            "name": get(desired, "name"),
            "age": get(desired, "age"),
            "location_preference": get(desired, "location_preference"),
            "bio": get(desired, "bio"),
            "relationship_looked_for": json_string_if_truthy(desired.get("relationship_looked_for")),
            "hobbies_activities": json_string_if_truthy(desired.get("hobbies_activities")),
            "main_aspects": json_string_if_truthy(desired.get("main_aspects")),
            "created_at": now,
            "updated_at": now,
        });

        let conversation_row = json!({
            "id": Uuid::new_v4().to_string(),
            "user_id": user_uuid,
            "conversation_type": "latest",
            "content": json_string_if_truthy(profile_data.get("transcript")),
            "profile_updates": json!({
                "personal_profile_changes": [],
                "desired_profile_changes": [],
            })
            .to_string(),
            "created_at": now,
            "updated_at": now,
        });

        if self.db.profiles.upsert(ProfileType::Personal, &personal_row).await?.is_empty() {
            return Err(AppError::Database("Échec de l'insertion du profil personnel".to_string()));
        }
        if self.db.profiles.upsert(ProfileType::Desired, &desired_row).await?.is_empty() {
            return Err(AppError::Database("Échec de l'insertion du profil désiré".to_string()));
        }
        if self.db.conversations.insert(&conversation_row).await?.is_empty() {
            return Err(AppError::Database("Échec de l'insertion de la conversation".to_string()));
        }

        Ok(json!({
            "personal_profile_id": personal_row["id"],
            "desired_profile_id": desired_row["id"],
            "conversation_id": conversation_row["id"],
            "user_uuid": user_uuid,
        }))
    }
}
