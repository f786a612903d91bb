use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::ProfileUpdater;
use crate::infrastructure::TranscriptQueue;
use crate::utils::error::Result;

/// Consommateur de la file des transcripts d'utilisateurs existants
pub struct ProfileUpdateWorker {
    queue: Arc<dyn TranscriptQueue>,
    updater: Arc<ProfileUpdater>,
    poll_interval: Duration,
}

impl ProfileUpdateWorker {
    pub fn new(queue: Arc<dyn TranscriptQueue>, updater: Arc<ProfileUpdater>, poll_interval: Duration) -> Self {
        Self {
            queue,
            updater,
            poll_interval,
        }
    }

    /// Traite un transcript de la file, `false` si elle était vide
    ///
    /// L'échec d'un transcript est journalisé, il n'est pas remis en file.
    pub async fn run_once(&self) -> Result<bool> {
        let Some(transcript) = self.queue.pop().await? else {
            return Ok(false);
        };

        match self.updater.process_transcript_update(&transcript).await {
            Ok(outcome) => info!(
                "✅ Transcript traité ({} profil(s) mis à jour)",
                outcome.updates.len()
            ),
            Err(e) => error!("❌ Échec de la mise à jour des profils: {}", e),
        }
        Ok(true)
    }

    pub async fn start(self) {
        info!(
            "🔧 Worker de mise à jour des profils démarré sur la file {}",
            self.queue.name()
        );

        loop {
            match self.run_once().await {
                // On vide la file avant de se remettre en attente
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => warn!("⚠️  Lecture de la file impossible: {}", e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Démarre le worker dans une tâche Tokio séparée
pub fn start_profile_update_worker(
    queue: Arc<dyn TranscriptQueue>,
    updater: Arc<ProfileUpdater>,
    poll_interval: Duration,
) {
    let worker = ProfileUpdateWorker::new(queue, updater, poll_interval);
    tokio::spawn(async move {
        worker.start().await;
    });
}
