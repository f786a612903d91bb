// api/embeddings.rs
use crate::core::EmbeddingService;
use crate::models::ErrorResponse;
use crate::utils::{error::AppError, value_to_string};
use crate::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde_json::Value;
use tracing::error;

/// Erreurs renvoyées avec leur message brut
fn error_response(err: AppError) -> HttpResponse {
    match err {
        AppError::Validation(message) => HttpResponse::BadRequest().json(ErrorResponse::new(message)),
        AppError::Internal(message) => HttpResponse::InternalServerError().json(ErrorResponse::new(message)),
        other => {
            error!("Erreur lors du traitement de la requête: {}", other);
            HttpResponse::InternalServerError().json(ErrorResponse::new(other.to_string()))
        }
    }
}

/// Configure les routes des embeddings
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/embeddings")
            .service(generate)
            .service(generate_for_user)
            .service(batch)
            .service(health),
    );
}

#[post("/generate")]
pub async fn generate(state: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    let request = match EmbeddingService::parse_request(&body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match state.embeddings.generate_for_profile(&request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(e),
    }
}

#[post("/generate-for-user")]
pub async fn generate_for_user(state: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    let Some(user_id) = body.get("user_id").filter(|id| !id.is_null()).map(value_to_string) else {
        return error_response(AppError::Validation("Le champ 'user_id' est requis".to_string()));
    };

    match state.embeddings.generate_for_user(&user_id).await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(e) => error_response(e),
    }
}

#[post("/batch")]
pub async fn batch(state: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    let Some(user_ids) = body.get("user_ids").and_then(Value::as_array) else {
        return error_response(AppError::Validation(
            "Le champ 'user_ids' est requis et doit être une liste".to_string(),
        ));
    };

    let user_ids: Vec<String> = user_ids.iter().map(value_to_string).collect();
    let limit = body
        .get("limit")
        .and_then(Value::as_u64)
        .map(|limit| limit as usize);

    HttpResponse::Ok().json(state.embeddings.batch(&user_ids, limit).await)
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.embeddings.health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixedEmbedder, ScriptedModel};
    use actix_web::{test, App};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(server: &MockServer, embedder: FixedEmbedder) -> web::Data<AppState> {
        web::Data::new(AppState::new_test(
            &server.uri(),
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(embedder),
        ))
    }

    #[actix_web::test]
    async fn test_generate_validates_fields() {
        let server = MockServer::start().await;
        let app = test::init_service(
            App::new()
                .app_data(state(&server, FixedEmbedder::new(3)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/embeddings/generate")
            .set_json(json!({"user_id": "u1", "profile_type": "personal", "profile_id": "p1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Le champ 'text' est requis");
    }

    #[actix_web::test]
    async fn test_generate_failure_is_500() {
        let server = MockServer::start().await;
        let app = test::init_service(
            App::new()
                .app_data(state(&server, FixedEmbedder::failing()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/embeddings/generate")
            .set_json(json!({"user_id": "u1", "profile_type": "personal", "profile_id": "p1", "text": "Marie"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Impossible de générer l'embedding");
    }

    #[actix_web::test]
    async fn test_generate_creates_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profile_embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profile_embeddings"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 7}])))
            .mount(&server)
            .await;
        let app = test::init_service(
            App::new()
                .app_data(state(&server, FixedEmbedder::new(1536)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/embeddings/generate")
            .set_json(json!({"user_id": "u1", "profile_type": "desired", "profile_id": "p1", "text": "Quelqu'un de drôle"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["embedding_status"], "created");
        assert_eq!(body["profile_type"], "desired");
        assert_eq!(body["dimensions"], 1536);
        assert_eq!(body["embedding_id"], 7);
    }

    #[actix_web::test]
    async fn test_batch_requires_a_list() {
        let server = MockServer::start().await;
        let app = test::init_service(
            App::new()
                .app_data(state(&server, FixedEmbedder::new(3)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/embeddings/batch")
            .set_json(json!({"user_ids": "u1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Le champ 'user_ids' est requis et doit être une liste");
    }

    #[actix_web::test]
    async fn test_generate_for_user_requires_user_id() {
        let server = MockServer::start().await;
        let app = test::init_service(
            App::new()
                .app_data(state(&server, FixedEmbedder::new(3)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/embeddings/generate-for-user")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
    }
}
