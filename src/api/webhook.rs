// api/webhook.rs
use crate::models::ErrorResponse;
use crate::AppState;
use actix_web::{get, http::Method, route, web, HttpRequest, HttpResponse};
use serde_json::Value;
use tracing::{error, info, warn};

const SECRET_HEADER: &str = "X-VAPI-SECRET";

/// Le secret attendu est comparé en minuscules
fn is_authorized(req: &HttpRequest, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    req.headers()
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|secret| secret == expected.to_lowercase())
        .unwrap_or(false)
}

/// Webhook de fin d'appel VAPI
///
/// `GET` renvoie le dernier traitement, `POST` extrait et route le transcript.
#[route("/api/vapi-webhook", method = "GET", method = "POST")]
pub async fn vapi_webhook(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    if *req.method() == Method::GET {
        return HttpResponse::Ok().json(state.router.last_state().await);
    }

    if !is_authorized(&req, state.config.vapi_webhook_secret.as_deref()) {
        warn!("🔒 Webhook VAPI refusé: secret invalide");
        return HttpResponse::Unauthorized().body("Non autorisé");
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Format JSON invalide: {}", e);
            return HttpResponse::BadRequest()
                .json(ErrorResponse::with_details("Format JSON invalide", e.to_string()));
        }
    };
    info!("📞 Webhook VAPI reçu ({} octets)", body.len());

    match state.router.process_webhook(&payload).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            error!("Erreur lors du traitement du webhook: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::with_details("Erreur lors du traitement", e.to_string()))
        }
    }
}

/// Envoie un transcript fictif au générateur de profils
#[get("/api/test-processor")]
pub async fn test_processor(state: web::Data<AppState>) -> HttpResponse {
    let (success, body) = state.router.test_processor().await;
    if success {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::InternalServerError().json(body)
    }
}
