use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::SessionManager;

/// Balayage périodique des sessions de chat inactives
pub struct SessionSweeper {
    sessions: Arc<SessionManager>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<SessionManager>, interval: Duration) -> Self {
        Self { sessions, interval }
    }

    /// Un passage : ferme les sessions expirées
    pub async fn run_once(&self) -> usize {
        let closed = self.sessions.check_inactive_sessions().await;
        if closed > 0 {
            info!("🧹 {} session(s) inactive(s) fermée(s)", closed);
        } else {
            debug!("Aucune session inactive");
        }
        closed
    }

    pub async fn start(self) {
        info!(
            "🔧 Balayage des sessions démarré (intervalle: {}s)",
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}

/// Démarre le balayage dans une tâche Tokio séparée
pub fn start_session_sweeper(sessions: Arc<SessionManager>, interval: Duration) {
    let sweeper = SessionSweeper::new(sessions, interval);
    tokio::spawn(async move {
        sweeper.start().await;
    });
}
