//! Configuration for Seva Records
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::{FirestoreConfig, MongoSettings, StoreConfig};

/// Seva Records - citizen services backend
#[derive(Parser, Debug, Clone)]
#[command(name = "seva-records")]
#[command(about = "Citizen services backend over MongoDB, Firestore, SQLite and a flat-file store")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Directory holding the flat-file collections (always enabled)
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Enable development mode (disables admin auth)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Use MongoDB as the primary engine
    #[arg(long, env = "USE_MONGODB", default_value = "false")]
    pub use_mongodb: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "seva_records")]
    pub mongodb_db: String,

    /// Use Firestore (primary when MongoDB is disabled or down)
    #[arg(long, env = "USE_FIRESTORE", default_value = "false")]
    pub use_firestore: bool,

    /// Firestore project id
    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    pub firestore_project_id: Option<String>,

    /// OAuth access token for the Firestore REST API (not needed for the emulator)
    #[arg(long, env = "FIRESTORE_TOKEN")]
    pub firestore_token: Option<String>,

    /// Firestore REST root
    #[arg(long, env = "FIRESTORE_BASE_URL", default_value = "https://firestore.googleapis.com/v1")]
    pub firestore_base_url: String,

    /// Use SQLite as the primary engine when neither MongoDB nor Firestore is enabled
    #[arg(long, env = "USE_SQLITE", default_value = "false")]
    pub use_sqlite: bool,

    /// SQLite database file
    #[arg(long, env = "SQLITE_PATH", default_value = "./data/seva.db")]
    pub sqlite_path: PathBuf,

    /// API key for admin access (X-Api-Key header)
    #[arg(long, env = "API_KEY_ADMIN")]
    pub api_key_admin: Option<String>,

    /// Remote engine request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl Args {
    /// Engines to try at startup, derived from the `USE_*` flags
    pub fn store_config(&self) -> StoreConfig {
        let mongo = self.use_mongodb.then(|| MongoSettings {
            uri: self.mongodb_uri.clone(),
            db_name: self.mongodb_db.clone(),
        });

        let firestore = if self.use_firestore {
            self.firestore_project_id
                .clone()
                .map(|project_id| FirestoreConfig {
                    project_id,
                    base_url: self.firestore_base_url.trim_end_matches('/').to_string(),
                    access_token: self.firestore_token.clone(),
                    request_timeout: Duration::from_millis(self.request_timeout_ms),
                })
        } else {
            None
        };

        StoreConfig {
            data_dir: self.data_dir.clone(),
            mongo,
            firestore,
            sqlite_path: self.use_sqlite.then(|| self.sqlite_path.clone()),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.api_key_admin.is_none() {
            return Err("API_KEY_ADMIN is required in production mode".to_string());
        }

        if self.use_firestore && self.firestore_project_id.is_none() {
            return Err("FIRESTORE_PROJECT_ID is required when USE_FIRESTORE is set".to_string());
        }

        if !matches!(self.log_format.to_ascii_lowercase().as_str(), "text" | "json") {
            return Err(format!("LOG_FORMAT must be text or json, got {}", self.log_format));
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}
