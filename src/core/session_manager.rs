// core/session_manager.rs
use crate::core::history::ConversationHistory;
use crate::infrastructure::database::Database;
use crate::models::{
    ActiveSessionView, ActiveSessionsReport, ArchivedMessage, ChatTurn, MonitorMessage,
    NewSession, SessionClosure, SessionCounts, SessionStatus, TurnRole,
};
use crate::utils::{now_iso, truncate_string};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[derive(Default)]
struct Registry {
    histories: HashMap<String, ConversationHistory>,
    activity: HashMap<String, DateTime<Utc>>,
}

/// Sessions de chat en mémoire
///
/// Une session est inactive quand sa dernière activité date de plus de
/// `timeout`. Les sessions sans activité connue ne sont jamais inactives.
pub struct SessionManager {
    db: Database,
    timeout: Duration,
    max_messages: usize,
    registry: RwLock<Registry>,
}

impl SessionManager {
    pub fn new(db: Database, timeout: Duration, max_messages: usize) -> Self {
        Self {
            db,
            timeout,
            max_messages,
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_expired(&self, last_activity: Option<&DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_activity {
            Some(last) => (now - *last)
                .to_std()
                .map(|elapsed| elapsed > self.timeout)
                .unwrap_or(false),
            None => false,
        }
    }

    pub async fn is_session_inactive(&self, session_id: &str) -> bool {
        let registry = self.registry.read().await;
        self.is_expired(registry.activity.get(session_id), Utc::now())
    }

    /// Enregistre une activité maintenant
    pub async fn touch(&self, session_id: &str) {
        self.touch_at(session_id, Utc::now()).await;
    }

    /// Enregistre une activité à une date donnée
    pub async fn touch_at(&self, session_id: &str, at: DateTime<Utc>) {
        self.registry
            .write()
            .await
            .activity
            .insert(session_id.to_string(), at);
    }

    /// Session active de l'utilisateur, en mémoire puis en base
    pub async fn get_active_session_id(&self, user_id: &str) -> Option<String> {
        let prefix = format!("{}_", user_id);
        {
            let registry = self.registry.read().await;
            let now = Utc::now();
            let in_memory = registry
                .histories
                .keys()
                .filter(|id| id.starts_with(&prefix))
                .find(|id| !self.is_expired(registry.activity.get(id.as_str()), now));
            if let Some(session_id) = in_memory {
                return Some(session_id.clone());
            }
        }

        match self.db.sessions.latest_active_id(user_id).await {
            Ok(Some(session_id)) => {
                self.touch(&session_id).await;
                Some(session_id)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Erreur lors de la récupération de la session active: {}", e);
                None
            }
        }
    }

    /// Crée une session `{user_id}_{timestamp}`
    ///
    /// Un échec d'insertion est journalisé, la session reste utilisable.
    pub async fn create_session(&self, user_id: &str, phone_number: &str) -> String {
        let session_id = format!("{}_{}", user_id, Utc::now().timestamp());
        let now = now_iso();
        let session = NewSession {
            id: session_id.clone(),
            user_id: user_id.to_string(),
            phone_number: phone_number.to_string(),
            start_time: now.clone(),
            last_activity: now,
            status: SessionStatus::Active,
            metadata: json!({}),
        };

        info!("Création d'une nouvelle session: {}", session_id);
        if let Err(e) = self.db.sessions.insert(&session).await {
            error!("Erreur lors de la création de la session: {}", e);
        }

        session_id
    }

    /// Historique de la session, chargé au premier accès
    pub async fn get_chat_history(&self, session_id: &str, phone_number: &str) -> ConversationHistory {
        let loaded = self.registry.read().await.histories.contains_key(session_id);
        if !loaded {
            let history =
                ConversationHistory::load(&self.db.messages, phone_number, self.max_messages).await;
            self.registry
                .write()
                .await
                .histories
                .entry(session_id.to_string())
                .or_insert(history);
        }

        let mut registry = self.registry.write().await;
        registry.activity.insert(session_id.to_string(), Utc::now());
        registry
            .histories
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| ConversationHistory::new(phone_number, self.max_messages))
    }

    /// Ajoute un tour à l'historique, renvoie la taille de la session
    pub async fn record_turn(&self, session_id: &str, role: TurnRole, content: &str) -> usize {
        let mut registry = self.registry.write().await;
        match registry.histories.get_mut(session_id) {
            Some(history) => {
                match role {
                    TurnRole::User => history.add_user_message(content),
                    TurnRole::Ai => history.add_ai_message(content),
                }
                history.session_messages.len()
            }
            None => {
                warn!("Session {} absente, message non historisé", session_id);
                0
            }
        }
    }

    /// Ferme une session et archive ses messages
    pub async fn close_session(&self, session_id: &str) {
        let (history, last_activity) = {
            let mut registry = self.registry.write().await;
            let Some(history) = registry.histories.remove(session_id) else {
                return;
            };
            (history, registry.activity.remove(session_id))
        };

        let (user_count, ai_count) = history.counts();
        info!(
            "Fermeture de session {} - Utilisateur: {}, IA: {}",
            session_id, user_count, ai_count
        );
        for (i, turn) in history.session_messages.iter().enumerate() {
            info!(
                "  Message {} ({}): {}",
                i + 1,
                turn.role.label(),
                truncate_string(&turn.content, 50)
            );
        }

        let closure = match build_closure(&history, last_activity) {
            Ok(closure) => closure,
            Err(e) => {
                error!("Erreur lors de la sérialisation de la session: {}", e);
                return;
            }
        };

        if let Err(e) = self.db.sessions.close(session_id, &closure).await {
            error!("Erreur lors de la mise à jour de la session: {}", e);
        }
    }

    /// Ferme toutes les sessions inactives, renvoie le nombre fermé
    pub async fn check_inactive_sessions(&self) -> usize {
        info!("Vérification des sessions inactives...");

        let (inactive, orphans): (Vec<String>, Vec<String>) = {
            let registry = self.registry.read().await;
            let now = Utc::now();
            let inactive = registry
                .histories
                .keys()
                .filter(|id| self.is_expired(registry.activity.get(id.as_str()), now))
                .cloned()
                .collect();
            let orphans = registry
                .activity
                .iter()
                .filter(|(id, last)| {
                    !registry.histories.contains_key(id.as_str()) && self.is_expired(Some(*last), now)
                })
                .map(|(id, _)| id.clone())
                .collect();
            (inactive, orphans)
        };

        if !orphans.is_empty() {
            let mut registry = self.registry.write().await;
            for id in &orphans {
                registry.activity.remove(id);
            }
        }

        for session_id in &inactive {
            info!(
                "Session {} inactive depuis {} secondes - fermeture",
                session_id,
                self.timeout.as_secs()
            );
            self.close_session(session_id).await;
        }

        inactive.len()
    }

    /// Sessions actives pour le monitoring
    pub async fn active_sessions_snapshot(&self) -> ActiveSessionsReport {
        let registry = self.registry.read().await;
        let now = Utc::now();

        let mut sessions: Vec<ActiveSessionView> = registry
            .histories
            .iter()
            .filter(|(id, _)| !self.is_expired(registry.activity.get(id.as_str()), now))
            .map(|(id, history)| ActiveSessionView {
                session_id: id.clone(),
                phone_number: history.phone_number.clone(),
                messages_count: history.session_messages.len(),
                messages: history
                    .session_messages
                    .iter()
                    .map(|turn| MonitorMessage {
                        kind: turn.role,
                        content: turn.content.clone(),
                    })
                    .collect(),
                last_activity: registry
                    .activity
                    .get(id)
                    .map(|at| at.to_rfc3339_opts(SecondsFormat::Micros, false)),
            })
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        ActiveSessionsReport {
            count: sessions.len(),
            sessions,
        }
    }
}

fn build_closure(
    history: &ConversationHistory,
    last_activity: Option<DateTime<Utc>>,
) -> serde_json::Result<SessionClosure> {
    let archived: Vec<ArchivedMessage> = history
        .session_messages
        .iter()
        .map(|turn: &ChatTurn| ArchivedMessage {
            kind: turn.role.message_type().to_string(),
            content: turn.content.clone(),
            timestamp: turn.created_at.to_rfc3339_opts(SecondsFormat::Micros, false),
        })
        .collect();
    let (user_messages, ai_messages) = history.counts();

    Ok(SessionClosure {
        end_time: now_iso(),
        last_activity: last_activity
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Micros, false),
        messages: serde_json::to_string(&archived)?,
        status: SessionStatus::Closed,
        metadata: SessionCounts {
            message_count: history.session_messages.len(),
            user_messages,
            ai_messages,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    async fn mock_supabase() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/sessions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        server
    }

    fn manager(uri: &str) -> SessionManager {
        SessionManager::new(Database::new_test(uri), Duration::from_secs(15), 20)
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_inactive() {
        let server = mock_supabase().await;
        let sessions = manager(&server.uri());

        assert!(!sessions.is_session_inactive("inconnue").await);
    }

    #[tokio::test]
    async fn test_session_becomes_inactive_after_timeout() {
        let server = mock_supabase().await;
        let sessions = manager(&server.uri());

        sessions.touch_at("u1_1", Utc::now() - chrono::Duration::seconds(16)).await;
        assert!(sessions.is_session_inactive("u1_1").await);

        sessions.touch("u1_1").await;
        assert!(!sessions.is_session_inactive("u1_1").await);
    }

    #[tokio::test]
    async fn test_active_session_found_in_memory_by_user_prefix() {
        let server = mock_supabase().await;
        let sessions = manager(&server.uri());

        sessions.get_chat_history("user-1_1700000000", "+33600000000").await;
        sessions.get_chat_history("user-10_1700000000", "+33600000001").await;

        assert_eq!(
            sessions.get_active_session_id("user-1").await,
            Some("user-1_1700000000".to_string())
        );
    }

    #[tokio::test]
    async fn test_active_session_falls_back_to_database() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/sessions"))
            .and(query_param("user_id", "eq.user-2"))
            .and(query_param("status", "eq.active"))
            .and(query_param("order", "last_activity.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "user-2_42"}])))
            .mount(&server)
            .await;

        let sessions = manager(&server.uri());
        assert_eq!(
            sessions.get_active_session_id("user-2").await,
            Some("user-2_42".to_string())
        );
        assert!(!sessions.is_session_inactive("user-2_42").await);
    }

    #[tokio::test]
    async fn test_database_error_gives_no_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sessions = manager(&server.uri());
        assert_eq!(sessions.get_active_session_id("user-3").await, None);
    }

    #[tokio::test]
    async fn test_create_session_survives_insert_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sessions = manager(&server.uri());
        let session_id = sessions.create_session("user-4", "+33600000000").await;

        assert!(session_id.starts_with("user-4_"));
    }

    #[tokio::test]
    async fn test_close_session_archives_messages() {
        let server = mock_supabase().await;
        let sessions = manager(&server.uri());

        sessions.get_chat_history("u5_1", "+33600000000").await;
        sessions.record_turn("u5_1", TurnRole::User, "Salut").await;
        sessions.record_turn("u5_1", TurnRole::Ai, "Hello toi").await;
        sessions.close_session("u5_1").await;

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let patch = requests
            .iter()
            .find(|r| r.method.to_string() == "PATCH")
            .expect("mise à jour de la session");
        let body: Value = serde_json::from_slice(&patch.body).unwrap();

        assert_eq!(body["status"], "closed");
        assert_eq!(body["metadata"]["message_count"], 2);
        assert_eq!(body["metadata"]["user_messages"], 1);
        assert_eq!(body["metadata"]["ai_messages"], 1);

        let archived: Vec<Value> = serde_json::from_str(body["messages"].as_str().unwrap()).unwrap();
        assert_eq!(archived[0]["type"], "HumanMessage");
        assert_eq!(archived[1]["type"], "AIMessage");
        assert_eq!(archived[1]["content"], "Hello toi");

        assert_eq!(sessions.active_sessions_snapshot().await.count, 0);
    }

    #[tokio::test]
    async fn test_close_session_removes_entry_when_update_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sessions = manager(&server.uri());
        sessions.get_chat_history("u6_1", "+33600000000").await;
        sessions.close_session("u6_1").await;

        assert_eq!(sessions.active_sessions_snapshot().await.count, 0);
        assert!(!sessions.is_session_inactive("u6_1").await);
    }

    #[tokio::test]
    async fn test_check_inactive_sessions_closes_only_idle_ones() {
        let server = mock_supabase().await;
        let sessions = manager(&server.uri());

        sessions.get_chat_history("idle_1", "+33600000000").await;
        sessions.get_chat_history("busy_1", "+33600000001").await;
        sessions.touch_at("idle_1", Utc::now() - chrono::Duration::seconds(60)).await;

        assert_eq!(sessions.check_inactive_sessions().await, 1);

        let report = sessions.active_sessions_snapshot().await;
        assert_eq!(report.count, 1);
        assert_eq!(report.sessions[0].session_id, "busy_1");
        assert!(report.sessions[0].last_activity.is_some());
    }
}
