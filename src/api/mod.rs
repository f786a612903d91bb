pub mod chat;
pub mod webhook;
pub mod profiles;
pub mod embeddings;

use actix_web::web;

/// Configure toutes les routes de l'API
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg
        // Chat
        .service(chat::index)
        .service(chat::chat)
        .service(chat::chat_raw)
        .service(chat::active_sessions)
        // Webhook VAPI
        .service(webhook::vapi_webhook)
        .service(webhook::test_processor)
        // Profils
        .service(profiles::profile_generator)
        .service(profiles::health)
        .service(profiles::updater_status)
        .service(profiles::updater_process);

    // Embeddings
    embeddings::configure_routes(cfg);
}
