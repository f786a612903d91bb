// core/profile_updater.rs
use crate::core::prompts::{self, fill};
use crate::infrastructure::database::Database;
use crate::infrastructure::llm::{CompletionOptions, LanguageModel, PromptMessage};
use crate::models::ProfileType;
use crate::utils::{
    error::{AppError, Result},
    now_iso,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

const MAX_RECORDED_UPDATES: usize = 10;

/// Champs jamais réécrits par une mise à jour
const PROTECTED_COLUMNS: [&str; 3] = ["id", "user_id", "created_at"];

/// Verdict du modèle sur un profil
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileAnalysis {
    #[serde(default)]
    pub update_needed: bool,
    #[serde(default)]
    pub updated_profile: Value,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRecord {
    pub timestamp: String,
    pub phone_number: String,
    pub personal_updated: bool,
    pub desired_updated: bool,
}

/// État du dernier traitement
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdaterStatus {
    pub last_update_time: Option<String>,
    pub last_phone_number: Option<String>,
    pub updates_performed: Vec<UpdateRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub updates: Map<String, Value>,
}

/// Mise à jour des profils des utilisateurs existants
pub struct ProfileUpdater {
    db: Database,
    llm: Arc<dyn LanguageModel>,
    status: RwLock<UpdaterStatus>,
}

impl ProfileUpdater {
    pub fn new(db: Database, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            db,
            llm,
            status: RwLock::new(UpdaterStatus::default()),
        }
    }

    /// Numéro du transcript (`call_metadata.customer_phone`, sinon `customer.number`)
    pub fn phone_number(transcript: &Value) -> Option<String> {
        transcript
            .pointer("/call_metadata/customer_phone")
            .or_else(|| transcript.pointer("/customer/number"))
            .and_then(Value::as_str)
            .filter(|phone| !phone.is_empty())
            .map(str::to_string)
    }

    fn conversation_text(transcript: &Value) -> String {
        transcript
            .pointer("/conversation_content/structured_exchanges")
            .and_then(Value::as_array)
            .map(|exchanges| {
                exchanges
                    .iter()
                    .map(|exchange| {
                        format!(
                            "{}: {}",
                            exchange["speaker"].as_str().unwrap_or_default(),
                            exchange["text"].as_str().unwrap_or_default()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    async fn analyze(&self, kind: ProfileType, profile: &Value, conversation: &str) -> Result<ProfileAnalysis> {
        let (system, label) = match kind {
            ProfileType::Personal => (prompts::PERSONAL_UPDATE_SYSTEM, "PROFIL PERSONNEL"),
            ProfileType::Desired => (prompts::DESIRED_UPDATE_SYSTEM, "PROFIL RECHERCHÉ"),
        };
        let current = serde_json::to_string_pretty(profile)?;
        let prompt = fill(
            prompts::PROFILE_UPDATE,
            &[
                ("label", label),
                ("profile", current.as_str()),
                ("conversation", conversation),
            ],
        );

        let options = CompletionOptions::json()
            .with_temperature(0.2)
            .with_max_tokens(2000);
        let response = self
            .llm
            .complete(&[PromptMessage::system(system), PromptMessage::user(prompt)], &options)
            .await?;

        serde_json::from_str(&response).map_err(|e| AppError::ParseError(e.to_string()))
    }

    /// Applique une analyse, renvoie vrai si le profil a été modifié
    async fn apply(&self, kind: ProfileType, user_id: &str, analysis: &ProfileAnalysis) -> Result<bool> {
        if !analysis.update_needed {
            return Ok(false);
        }
        let Some(fields) = analysis.updated_profile.as_object().filter(|f| !f.is_empty()) else {
            return Ok(false);
        };

        let mut changes: Map<String, Value> = fields
            .iter()
            .filter(|(key, _)| !PROTECTED_COLUMNS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        changes.insert("updated_at".to_string(), json!(now_iso()));

        self.db
            .profiles
            .update_for_user(kind, user_id, &Value::Object(changes))
            .await?;
        info!("✏️ Profil {} mis à jour pour {}", kind.as_str(), user_id);
        Ok(true)
    }

    /// Analyse un transcript d'utilisateur existant et met ses profils à jour
    pub async fn process_transcript_update(&self, transcript: &Value) -> Result<UpdateOutcome> {
        let phone_number = Self::phone_number(transcript)
            .ok_or_else(|| AppError::BadRequest("Numéro de téléphone manquant".to_string()))?;
        info!("🔄 Mise à jour des profils pour {}", phone_number);

        let not_found = || AppError::NotFound(format!("Profil pour {}", phone_number));
        let user_id = self
            .db
            .users
            .find_id_by_phone(&phone_number)
            .await?
            .ok_or_else(not_found)?;
        let personal = self
            .db
            .profiles
            .find_by_user(ProfileType::Personal, &user_id)
            .await?
            .ok_or_else(not_found)?;
        let desired = self.db.profiles.find_by_user(ProfileType::Desired, &user_id).await?;

        let conversation = Self::conversation_text(transcript);
        let mut updates = Map::new();

        let analysis = self.analyze(ProfileType::Personal, &personal, &conversation).await?;
        let personal_updated = self.apply(ProfileType::Personal, &user_id, &analysis).await?;
        if personal_updated {
            updates.insert(ProfileType::Personal.result_key().to_string(), json!(analysis.reasoning));
        }

        let mut desired_updated = false;
        if let Some(desired) = desired {
            let analysis = self.analyze(ProfileType::Desired, &desired, &conversation).await?;
            desired_updated = self.apply(ProfileType::Desired, &user_id, &analysis).await?;
            if desired_updated {
                updates.insert(ProfileType::Desired.result_key().to_string(), json!(analysis.reasoning));
            }
        }

        {
            let now = now_iso();
            let mut status = self.status.write().await;
            status.last_update_time = Some(now.clone());
            status.last_phone_number = Some(phone_number.clone());
            if personal_updated || desired_updated {
                status.updates_performed.push(UpdateRecord {
                    timestamp: now,
                    phone_number: phone_number.clone(),
                    personal_updated,
                    desired_updated,
                });
                let excess = status.updates_performed.len().saturating_sub(MAX_RECORDED_UPDATES);
                status.updates_performed.drain(..excess);
            }
        }

        let exchanges = transcript
            .pointer("/conversation_content/structured_exchanges")
            .cloned()
            .unwrap_or_else(|| json!([]));
        let conversation_row = json!({
            "user_id": user_id,
            "transcript": exchanges,
            "created_at": now_iso(),
        });
        if let Err(e) = self.db.conversations.insert(&conversation_row).await {
            error!("Erreur lors du stockage de la conversation: {}", e);
        }

        info!(
            "✅ Traitement terminé pour {} (personnel: {}, recherché: {})",
            phone_number, personal_updated, desired_updated
        );
        Ok(UpdateOutcome { success: true, updates })
    }

    pub async fn status(&self) -> Value {
        json!({
            "status": "running",
            "version": "1.0",
            "last_processing": *self.status.read().await,
        })
    }
}
