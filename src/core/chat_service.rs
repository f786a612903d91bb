// core/chat_service.rs
use crate::core::prompts::{self, fill};
use crate::core::session_manager::SessionManager;
use crate::infrastructure::database::Database;
use crate::infrastructure::llm::{CompletionOptions, LanguageModel, PromptMessage};
use crate::models::{ChatTurn, Direction, NewMessage, ProfileType, TurnRole};
use crate::utils::{json_column, truncate_string, value_to_string};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const USER_NOT_FOUND_REPLY: &str = "Utilisateur non trouvé";
pub const FALLBACK_REPLY: &str = "Désolé, je n'ai pas pu traiter votre message correctement.";

const NOT_SPECIFIED: &str = "Non spécifié";
const NOT_AVAILABLE: &str = "Non disponible";

/// Contexte utilisateur injecté dans le prompt
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub personal_profile: Value,
    pub last_conversation: Option<Value>,
    pub recent_messages: Vec<Value>,
}

impl UserContext {
    pub fn empty() -> Self {
        Self {
            personal_profile: json!({}),
            ..Default::default()
        }
    }
}

pub struct ChatService {
    db: Database,
    sessions: Arc<SessionManager>,
    llm: Arc<dyn LanguageModel>,
    temperature: f64,
    inline_sweep_probability: f64,
}

impl ChatService {
    pub fn new(
        db: Database,
        sessions: Arc<SessionManager>,
        llm: Arc<dyn LanguageModel>,
        temperature: f64,
        inline_sweep_probability: f64,
    ) -> Self {
        Self {
            db,
            sessions,
            llm,
            temperature,
            inline_sweep_probability,
        }
    }

    /// Traite un message entrant et renvoie la réponse de Jackie
    pub async fn handle_user_message(&self, phone_number: &str, message: &str) -> String {
        info!(
            "Nouveau message reçu de {}: {}",
            phone_number,
            truncate_string(message, 50)
        );

        // 1. Identification de l'utilisateur
        let Some(user_id) = self.get_user_id(phone_number).await else {
            return USER_NOT_FOUND_REPLY.to_string();
        };

        // 2. Session active ou nouvelle session
        let session_id = match self.sessions.get_active_session_id(&user_id).await {
            Some(session_id) => session_id,
            None => self.sessions.create_session(&user_id, phone_number).await,
        };

        // 3. Activité
        self.sessions.touch(&session_id).await;

        // 4. Contexte utilisateur
        let context = self.get_user_context(&user_id).await;

        // 5. Historique (copie prise avant l'ajout du message courant)
        let history = self.sessions.get_chat_history(&session_id, phone_number).await;

        // 6-7. Message utilisateur
        let total = self
            .sessions
            .record_turn(&session_id, TurnRole::User, message)
            .await;
        info!(
            "Message utilisateur ajouté à l'historique: {} (total session: {} messages)",
            truncate_string(message, 30),
            total
        );
        self.store_message(&user_id, phone_number, message, Direction::Incoming)
            .await;

        // 8. Réponse IA
        let response = self
            .process_message_with_context(message, &context, &history.messages)
            .await;
        info!("Réponse IA générée: {}", truncate_string(&response, 30));

        // 9-10. Réponse IA
        let total = self
            .sessions
            .record_turn(&session_id, TurnRole::Ai, &response)
            .await;
        info!(
            "Message IA ajouté à l'historique: {} (total session: {} messages)",
            truncate_string(&response, 30),
            total
        );
        self.store_message(&user_id, phone_number, &response, Direction::Outgoing)
            .await;

        // 11. Vérification ponctuelle des sessions inactives
        if rand::random::<f64>() < self.inline_sweep_probability {
            self.sessions.check_inactive_sessions().await;
        }

        response
    }

    async fn get_user_id(&self, phone_number: &str) -> Option<String> {
        info!("Recherche de l'utilisateur avec le numéro: {}", phone_number);
        match self.db.users.find_id_by_phone(phone_number).await {
            Ok(Some(user_id)) => {
                info!("Utilisateur trouvé avec l'ID: {}", user_id);
                Some(user_id)
            }
            Ok(None) => {
                warn!("Aucun utilisateur trouvé pour le numéro: {}", phone_number);
                None
            }
            Err(e) => {
                error!("Erreur lors de la récupération de l'ID utilisateur: {}", e);
                None
            }
        }
    }

    /// Profil, dernier transcript et messages récents de l'utilisateur
    pub async fn get_user_context(&self, user_id: &str) -> UserContext {
        info!("Récupération du contexte pour l'utilisateur: {}", user_id);

        let profile = self.db.profiles.find_by_user(ProfileType::Personal, user_id);
        let transcript = self.db.conversations.latest_transcript(user_id);
        let messages = self.db.messages.recent_by_user(user_id, 5);

        match tokio::try_join!(profile, transcript, messages) {
            Ok((profile, last_conversation, recent_messages)) => {
                info!(
                    "Contexte récupéré: profil {}, transcript {}, {} messages récents",
                    if profile.is_some() { "présent" } else { "absent" },
                    if last_conversation.is_some() { "disponible" } else { "indisponible" },
                    recent_messages.len()
                );
                UserContext {
                    personal_profile: profile.unwrap_or_else(|| json!({})),
                    last_conversation,
                    recent_messages,
                }
            }
            Err(e) => {
                error!("Erreur lors de la récupération du contexte: {}", e);
                UserContext::empty()
            }
        }
    }

    /// Génère la réponse à partir du contexte et de l'historique
    pub async fn process_message_with_context(
        &self,
        message: &str,
        context: &UserContext,
        history: &[ChatTurn],
    ) -> String {
        let mut prompt = Vec::with_capacity(history.len() + 3);
        prompt.push(PromptMessage::system(prompts::JACKIE_SYSTEM));
        prompt.push(PromptMessage::system(render_user_context(&context.personal_profile)));
        prompt.extend(history.iter().map(|turn| match turn.role {
            TurnRole::User => PromptMessage::user(turn.content.clone()),
            TurnRole::Ai => PromptMessage::assistant(turn.content.clone()),
        }));
        prompt.push(PromptMessage::user(message));

        info!("Envoi de {} messages au LLM", prompt.len());

        let options = CompletionOptions::default().with_temperature(self.temperature);
        match self.llm.complete(&prompt, &options).await {
            Ok(response) => response,
            Err(e) => {
                error!("Erreur lors du traitement du message: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Enregistre un message, `None` en cas d'échec
    pub async fn store_message(
        &self,
        user_id: &str,
        phone_number: &str,
        content: &str,
        direction: Direction,
    ) -> Option<Value> {
        let message = NewMessage::new(user_id, phone_number, content, direction);
        info!(
            "Stockage du message {} ({}): {}",
            message.id,
            direction.as_str(),
            truncate_string(content, 50)
        );

        match self.db.messages.insert(&message).await {
            Ok(row) => {
                info!("Message stocké avec succès");
                row
            }
            Err(e) => {
                error!("Erreur lors du stockage du message: {}", e);
                None
            }
        }
    }
}

/// Bloc système décrivant le profil de l'utilisateur
pub fn render_user_context(profile: &Value) -> String {
    let field = |key: &str, default: &str| match profile.get(key) {
        Some(value) if !value.is_null() => value_to_string(value),
        _ => default.to_string(),
    };
    let joined = |column: &str, key: &str| {
        let items: Vec<String> = json_column(profile, column)
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(value_to_string).collect())
            .unwrap_or_default();
        if items.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            items.join(", ")
        }
    };

    let relationship = json_column(profile, "relationship_looked_for")
        .get("description")
        .filter(|d| !d.is_null())
        .map(value_to_string)
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());

    let name = field("name", NOT_SPECIFIED);
    let age = field("age", NOT_SPECIFIED);
    let location = field("location", NOT_SPECIFIED);
    let bio = field("bio", NOT_AVAILABLE);
    let hobbies = joined("hobbies_activities", "hobbies");
    let personality = joined("main_aspects", "personality");

    fill(
        prompts::USER_CONTEXT,
        &[
            ("name", name.as_str()),
            ("age", age.as_str()),
            ("location", location.as_str()),
            ("bio", bio.as_str()),
            ("hobbies", hobbies.as_str()),
            ("personality", personality.as_str()),
            ("relationship", relationship.as_str()),
        ],
    )
}
