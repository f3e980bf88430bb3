//! Seva Records - citizen services backend
//!
//! Citizens, service applications, payments and notifications kept in one logical record
//! store that spans several engines.
//!
//! ## Layers
//!
//! - **db**: storage engines (MongoDB, Firestore, SQLite, flat file) and the
//!   [`UnifiedStore`](db::UnifiedStore) façade with fallback and mirroring
//! - **models**: typed entities and the application status state machine
//! - **services**: submission, status transitions, payments, notifications, dashboard
//! - **routes** / **server**: JSON HTTP API over hyper

pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{RecordError, RecordId, Result};
