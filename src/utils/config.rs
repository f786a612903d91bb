// utils/config.rs
use crate::utils::error::{AppError, Result};
use dotenv::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Environnement et serveur
    pub run_mode: String,
    pub server_host: String,
    pub server_port: u16,
    pub workers: usize,
    pub log_level: String,
    pub log_format: String,

    // Supabase
    pub supabase_url: String,
    pub supabase_key: String,

    // Azure OpenAI
    pub azure_openai_endpoint: String,
    pub azure_openai_api_key: String,
    pub azure_openai_deployment_name: String,
    pub azure_openai_api_version: String,
    pub azure_openai_embedding_deployment: String,
    pub azure_openai_analysis_deployment: String,
    pub chat_temperature: f64,

    // Sessions de chat
    pub session_timeout_seconds: u64,
    pub session_sweep_interval_seconds: u64,
    pub history_max_messages: usize,
    pub inline_sweep_probability: f64,
    pub default_phone_number: String,

    // Webhook VAPI et routage des transcripts
    pub vapi_webhook_secret: Option<String>,
    pub profile_generator_url: Option<String>,
    pub profile_function_key: Option<String>,
    pub redis_url: Option<String>,
    pub transcript_queue_name: String,
    pub update_poll_interval_seconds: u64,

    // Clients HTTP
    pub http_timeout_seconds: u64,
}

impl Config {
    /// Charger la configuration depuis les variables d'environnement
    pub fn from_env() -> Result<Self> {
        // Charger le fichier .env si présent
        let _ = dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Construire la configuration à partir d'une source de variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // Anciennes variables *_DEV acceptées en repli
        let supabase_url = get("SUPABASE_URL").or_else(|| get("SUPABASE_URL_DEV"));
        let supabase_key = get("SUPABASE_KEY").or_else(|| get("SUPABASE_KEY_DEV"));

        let required = |name: &str, value: Option<String>| -> Result<String> {
            value.ok_or_else(|| {
                AppError::Validation(format!(
                    "Variable d'environnement requise manquante: {}",
                    name
                ))
            })
        };

        let config = Config {
            // Environnement et serveur
            run_mode: get("RUN_MODE").unwrap_or_else(|| "development".to_string()),
            server_host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&get, "SERVER_PORT", 8000)?,
            workers: parse_or(&get, "WORKERS", 4)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: get("LOG_FORMAT").unwrap_or_else(|| "json".to_string()),

            // Supabase
            supabase_url: required("SUPABASE_URL", supabase_url)?,
            supabase_key: required("SUPABASE_KEY", supabase_key)?,

            // Azure OpenAI
            azure_openai_endpoint: required("AZURE_OPENAI_ENDPOINT", get("AZURE_OPENAI_ENDPOINT"))?,
            azure_openai_api_key: required(
                "AZURE_OPENAI_API_KEY",
                get("AZURE_OPENAI_API_KEY").or_else(|| get("AZURE_OPENAI_KEY")),
            )?,
            azure_openai_deployment_name: required(
                "AZURE_OPENAI_DEPLOYMENT_NAME",
                get("AZURE_OPENAI_DEPLOYMENT_NAME"),
            )?,
            azure_openai_api_version: get("AZURE_OPENAI_API_VERSION")
                .unwrap_or_else(|| "2025-01-01-preview".to_string()),
            azure_openai_embedding_deployment: get("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            azure_openai_analysis_deployment: get("AZURE_OPENAI_ANALYSIS_DEPLOYMENT")
                .or_else(|| get("AZURE_OPENAI_DEPLOYMENT"))
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            chat_temperature: parse_or(&get, "CHAT_TEMPERATURE", 0.7)?,

            // Sessions de chat
            session_timeout_seconds: parse_or(&get, "SESSION_TIMEOUT_SECONDS", 15)?,
            session_sweep_interval_seconds: parse_or(&get, "SESSION_SWEEP_INTERVAL_SECONDS", 10)?,
            history_max_messages: parse_or(&get, "HISTORY_MAX_MESSAGES", 20)?,
            inline_sweep_probability: parse_or(&get, "INLINE_SWEEP_PROBABILITY", 0.1)?,
            default_phone_number: get("DEFAULT_PHONE_NUMBER")
                .unwrap_or_else(|| "+33686796460".to_string()),

            // Webhook VAPI et routage des transcripts
            vapi_webhook_secret: get("VAPI_WEBHOOK_SECRET"),
            profile_generator_url: get("PROFILE_GENERATOR_URL"),
            profile_function_key: get("PROFILE_FUNCTION_KEY"),
            redis_url: get("REDIS_URL"),
            transcript_queue_name: get("TRANSCRIPT_QUEUE_NAME")
                .unwrap_or_else(|| "existing-user-transcripts".to_string()),
            update_poll_interval_seconds: parse_or(&get, "UPDATE_POLL_INTERVAL_SECONDS", 5)?,

            // Clients HTTP
            http_timeout_seconds: parse_or(&get, "HTTP_TIMEOUT_SECONDS", 30)?,
        };

        if !(0.0..=1.0).contains(&config.inline_sweep_probability) {
            return Err(AppError::Validation(
                "INLINE_SWEEP_PROBABILITY must be between 0 and 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Configuration pour les tests (services externes simulés)
    #[cfg(test)]
    pub fn new_test(supabase_url: &str) -> Self {
        Config {
            run_mode: "test".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            workers: 1,
            log_level: "debug".to_string(),
            log_format: "compact".to_string(),
            supabase_url: supabase_url.to_string(),
            supabase_key: "test-key".to_string(),
            azure_openai_endpoint: "http://localhost:9".to_string(),
            azure_openai_api_key: "test-key".to_string(),
            azure_openai_deployment_name: "gpt-4o".to_string(),
            azure_openai_api_version: "2025-01-01-preview".to_string(),
            azure_openai_embedding_deployment: "text-embedding-3-small".to_string(),
            azure_openai_analysis_deployment: "gpt-4o-mini".to_string(),
            chat_temperature: 0.7,
            session_timeout_seconds: 15,
            session_sweep_interval_seconds: 10,
            history_max_messages: 20,
            inline_sweep_probability: 0.0,
            default_phone_number: "+33686796460".to_string(),
            vapi_webhook_secret: Some("secret-vapi".to_string()),
            profile_generator_url: None,
            profile_function_key: None,
            redis_url: None,
            transcript_queue_name: "existing-user-transcripts".to_string(),
            update_poll_interval_seconds: 1,
            http_timeout_seconds: 5,
        }
    }
}

/// Lire une variable typée avec une valeur par défaut
fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(default),
    }
}
