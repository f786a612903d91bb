//! # Workers
//!
//! Tâches de fond lancées au démarrage du serveur :
//! - `session_sweeper.rs` : fermeture des sessions de chat inactives
//! - `profile_update_worker.rs` : consommation de la file des transcripts
//!   d'utilisateurs existants
//!
//! Chaque worker tourne en boucle dans sa propre tâche Tokio et journalise
//! ses erreurs sans s'arrêter.

pub mod session_sweeper;
pub mod profile_update_worker;

pub use session_sweeper::{start_session_sweeper, SessionSweeper};
pub use profile_update_worker::{start_profile_update_worker, ProfileUpdateWorker};
