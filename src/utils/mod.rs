// utils/mod.rs
pub mod error;
pub mod config;
pub mod validation;
pub mod helpers;

// Ré-exports pour faciliter l'import
pub use error::{AppError, Result};
pub use config::Config;
pub use validation::first_missing_field;
pub use helpers::{
    now_iso, now_utc_compact, truncate_string, round_to,
    value_to_string, is_truthy, json_column, json_string_if_truthy,
    estimate_tokens,
};
