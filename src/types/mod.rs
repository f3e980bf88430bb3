//! Shared types

mod error;
mod ids;

pub use error::{RecordError, Result};
pub use ids::{is_object_id, RecordId};
