//! Configuration module for the question bank backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("QBANK_DB_PATH")
            .unwrap_or_else(|_| "./data/qbank.sqlite".to_string())
            .into();

        let index_path = env::var("QBANK_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let raw_addr = env::var("QBANK_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = raw_addr.parse().map_err(|_| {
            AppError::Validation(format!("Invalid QBANK_BIND_ADDR format: {}", raw_addr))
        })?;

        let log_level = env::var("QBANK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            db_path,
            index_path,
            bind_addr,
            log_level,
        })
    }
}
