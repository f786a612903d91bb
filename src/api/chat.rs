// api/chat.rs
use crate::models::{ChatRequest, ChatResponse, ErrorResponse};
use crate::utils::error::Result;
use crate::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

/// Vérification que l'API répond
#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Jackie API is running!" }))
}

#[post("/chat")]
pub async fn chat(state: web::Data<AppState>, request: web::Json<ChatRequest>) -> Result<HttpResponse> {
    request.validate()?;

    let phone_number = request
        .phone_number
        .as_deref()
        .filter(|phone| !phone.trim().is_empty())
        .unwrap_or(state.config.default_phone_number.as_str());
    info!("💬 Message reçu de {}", phone_number);

    let response = state
        .chat
        .handle_user_message(phone_number, &request.message)
        .await;
    Ok(HttpResponse::Ok().json(ChatResponse { response }))
}

/// Variante sans schéma : `phone_number` et `message` sont obligatoires
#[post("/chat/raw")]
pub async fn chat_raw(state: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let (Some(phone_number), Some(message)) = (field("phone_number"), field("message")) else {
        return HttpResponse::BadRequest().json(ErrorResponse::new("Missing phone_number or message"));
    };

    let response = state.chat.handle_user_message(phone_number, message).await;
    HttpResponse::Ok().json(ChatResponse { response })
}

/// Sessions actives et leurs messages
#[get("/monitor/active-sessions")]
pub async fn active_sessions(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.sessions.active_sessions_snapshot().await)
}
