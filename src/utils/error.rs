// utils/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // Erreurs de requête
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Erreurs de ressources
    #[error("{0} not found")]
    NotFound(String),

    // Erreurs de données
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    // Erreurs externes
    #[error("External service error: {0}")]
    ExternalService(String),

    // Erreurs Supabase / PostgREST
    #[error("Database error: {0}")]
    Database(String),

    // Erreurs Azure OpenAI
    #[error("Language model error: {0}")]
    Llm(String),

    // Erreurs de la file d'attente des transcripts
    #[error("Queue error: {0}")]
    Queue(String),

    // Erreurs système
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Code machine renvoyé dans le corps JSON
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ExternalService(_) | AppError::Database(_) | AppError::Llm(_) => "BAD_GATEWAY",
            AppError::Timeout(_) => "GATEWAY_TIMEOUT",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExternalService(_) | AppError::Database(_) | AppError::Llm(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // 500 - le détail reste dans les logs
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal server error: {}", self);
            return HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error",
                "code": self.code()
            }));
        }

        if status.is_server_error() {
            tracing::error!("Upstream failure: {}", self);
        }

        HttpResponse::build(status).json(json!({
            "error": self.to_string(),
            "code": self.code()
        }))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::ExternalService(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializeError(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Queue(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let error_messages: Vec<String> = errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect();
        messages.sort();

        AppError::Validation(messages.join("; "))
    }
}

// Type de résultat standard
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_validation_error_is_bad_request() {
        let err = AppError::Validation("message: Le message est requis".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], "BAD_REQUEST");
        assert!(value["error"].as_str().unwrap().contains("Le message est requis"));
    }

    #[actix_web::test]
    async fn test_internal_error_hides_details() {
        let err = AppError::Internal("stack secrète".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(!text.contains("stack secrète"));
    }

    #[test]
    fn test_upstream_errors_map_to_bad_gateway() {
        assert_eq!(AppError::Database("503".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Llm("vide".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Timeout("30s".into()).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
