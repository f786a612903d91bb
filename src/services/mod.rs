// services/mod.rs
pub mod external;

pub use external::ProfileGeneratorClient;
