//! Record identifiers
//!
//! Every record has a logical id (`citizen_id`, `application_id`, ...) that is stable
//! across engines, and may carry a native id assigned by whichever engine stored it
//! (a MongoDB ObjectId, a SQLite row id, a Firestore document name, a flat-file counter).
//! Callers resolve which one they hold once, at the API boundary.

use std::fmt;

/// Identifier handed to the record store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// Business identifier, e.g. `CIT1729250000000123` or `DL1729250000000042`
    Logical(String),
    /// Engine-internal identifier
    Native(String),
}

impl RecordId {
    /// Classify a raw identifier by shape.
    ///
    /// 24-character hex strings (ObjectIds) and all-digit strings (row ids and flat-file
    /// counters) are native; anything else is logical. Generated logical ids start with a
    /// letter and are shorter than 24 characters, so they always parse as logical.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if is_object_id(raw) || (!raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())) {
            RecordId::Native(raw.to_string())
        } else {
            RecordId::Logical(raw.to_string())
        }
    }

    pub fn logical(id: impl Into<String>) -> Self {
        RecordId::Logical(id.into())
    }

    pub fn native(id: impl Into<String>) -> Self {
        RecordId::Native(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            RecordId::Logical(s) | RecordId::Native(s) => s,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Logical(s) => write!(f, "{}", s),
            RecordId::Native(s) => write!(f, "native:{}", s),
        }
    }
}

/// Whether `s` has the shape of a MongoDB ObjectId (24 hex characters)
pub fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
