// api/profiles.rs
use crate::models::{CallFeatures, ErrorResponse};
use crate::utils::error::Result;
use crate::AppState;
use actix_web::{get, http::Method, post, route, web, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use tracing::{error, info};

/// Génération de profils à partir d'un transcript VAPI formaté
#[route("/api/profile-generator", method = "GET", method = "POST")]
pub async fn profile_generator(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    if *req.method() == Method::GET {
        return HttpResponse::Ok().json(state.generator.last_state().await);
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Format JSON invalide: {}", e);
            return HttpResponse::BadRequest()
                .json(ErrorResponse::with_details("Format JSON invalide", e.to_string()));
        }
    };
    state.generator.remember_input(&payload).await;

    let features: CallFeatures = match serde_json::from_value(payload) {
        Ok(features) => features,
        Err(e) => {
            error!("Transcript incomplet: {}", e);
            return HttpResponse::BadRequest()
                .json(ErrorResponse::with_details("Format JSON invalide", e.to_string()));
        }
    };

    info!("🧬 Génération de profils pour l'appel {}", features.call_metadata.call_id);
    let result = state.generator.process_vapi_data(&features).await;
    HttpResponse::Ok().json(result)
}

#[get("/api/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok", "message": "Fonction en ligne" }))
}

#[get("/api/profile-updater/status")]
pub async fn updater_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.updater.status().await)
}

/// Mise à jour manuelle, identique au traitement de la file
#[post("/api/profile-updater/process")]
pub async fn updater_process(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse> {
    let outcome = state.updater.process_transcript_update(&body).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
