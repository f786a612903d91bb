// core/history.rs
use crate::infrastructure::database::MessagesRepository;
use crate::models::{ChatTurn, TurnRole};
use crate::utils::truncate_string;
use tracing::{error, info};

/// Historique d'une conversation de chat
///
/// `messages` sert de contexte au modèle (borné à `max_messages`),
/// `session_messages` ne contient que les tours de la session en cours.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub phone_number: String,
    pub messages: Vec<ChatTurn>,
    pub session_messages: Vec<ChatTurn>,
    pub max_messages: usize,
}

impl ConversationHistory {
    pub fn new(phone_number: &str, max_messages: usize) -> Self {
        Self {
            phone_number: phone_number.to_string(),
            messages: Vec::new(),
            session_messages: Vec::new(),
            max_messages,
        }
    }

    /// Charge les derniers messages du numéro depuis Supabase
    ///
    /// Une erreur de chargement donne un historique vide.
    pub async fn load(repo: &MessagesRepository, phone_number: &str, max_messages: usize) -> Self {
        let mut history = Self::new(phone_number, max_messages);

        match repo.recent_by_phone(phone_number, max_messages).await {
            Ok(rows) => {
                history.messages = rows
                    .into_iter()
                    .rev()
                    .filter_map(|row| {
                        let role = row.direction()?.turn_role();
                        Some(ChatTurn {
                            role,
                            created_at: row.created_at_utc(),
                            content: row.content,
                        })
                    })
                    .collect();
                info!(
                    "Chargement de l'historique de contexte - {} messages chargés",
                    history.messages.len()
                );
            }
            Err(e) => error!("Erreur lors du chargement des messages: {}", e),
        }

        history
    }

    fn add(&mut self, turn: ChatTurn) {
        info!(
            "Message {} ajouté: {}",
            turn.role.label(),
            truncate_string(&turn.content, 50)
        );

        self.messages.push(turn.clone());
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
        self.session_messages.push(turn);

        info!(
            "  - Historique de contexte: {} messages, session: {} messages",
            self.messages.len(),
            self.session_messages.len()
        );
    }

    pub fn add_user_message(&mut self, content: &str) {
        self.add(ChatTurn::user(content));
    }

    pub fn add_ai_message(&mut self, content: &str) {
        self.add(ChatTurn::ai(content));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.session_messages.clear();
        info!("Historiques effacés");
    }

    /// Nombre de messages (utilisateur, IA) de la session
    pub fn counts(&self) -> (usize, usize) {
        let user = self
            .session_messages
            .iter()
            .filter(|turn| turn.role == TurnRole::User)
            .count();
        (user, self.session_messages.len() - user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::SupabaseClient;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_context_is_bounded_but_session_is_not() {
        let mut history = ConversationHistory::new("+33600000000", 3);
        for i in 0..5 {
            history.add_user_message(&format!("message {}", i));
        }

        assert_eq!(history.messages.len(), 3);
        assert_eq!(history.messages[0].content, "message 2");
        assert_eq!(history.session_messages.len(), 5);
    }

    #[test]
    fn test_counts_and_clear() {
        let mut history = ConversationHistory::new("+33600000000", 20);
        history.add_user_message("Salut Jackie");
        history.add_ai_message("Hey ! Comment ça va ?");
        history.add_user_message("Très bien");

        assert_eq!(history.counts(), (2, 1));

        history.clear();
        assert!(history.messages.is_empty());
        assert_eq!(history.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_load_reverses_and_skips_unknown_directions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/messages"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"content": "Réponse", "direction": "outgoing", "created_at": "2025-03-01T10:00:02+00:00"},
                {"content": "Système", "direction": "internal", "created_at": "2025-03-01T10:00:01+00:00"},
                {"content": "Question", "direction": "incoming", "created_at": "2025-03-01T10:00:00"}
            ])))
            .mount(&server)
            .await;

        let repo = MessagesRepository::new(Arc::new(SupabaseClient::new(&server.uri(), "k", 5).unwrap()));
        let history = ConversationHistory::load(&repo, "+33600000000", 20).await;

        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].role, TurnRole::User);
        assert_eq!(history.messages[0].content, "Question");
        assert_eq!(history.messages[1].role, TurnRole::Ai);
        assert!(history.session_messages.is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_gives_empty_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let repo = MessagesRepository::new(Arc::new(SupabaseClient::new(&server.uri(), "k", 5).unwrap()));
        let history = ConversationHistory::load(&repo, "+33600000000", 20).await;

        assert!(history.messages.is_empty());
    }
}
