//! Typed entities stored through the unified record store

mod application;
mod citizen;
mod history;
mod notification;
mod payment;

pub use application::{
    notification_template, Application, ApplicationStatus, ApplicationUpdate, NewApplication,
    NotificationTemplate,
};
pub use citizen::{Citizen, CitizenStatus, CitizenUpdate, Gender, NewCitizen};
pub use history::StatusHistoryEntry;
pub use notification::{NewNotification, Notification, NotificationType};
pub use payment::{NewPayment, Payment, PaymentStatus, PaymentUpdate};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::db::{Collection, Record};
use crate::types::{RecordError, Result};

/// An entity kind with its own collection in every engine
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    /// The logical identifier
    fn logical_id(&self) -> &str;

    fn to_record(&self) -> Result<Record> {
        to_record(self)
    }

    fn from_record(record: Record) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

/// Serialize any struct to a record. `None` fields are skipped, so update structs
/// serialize to exactly the fields they set.
pub fn to_record<T: Serialize + ?Sized>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(RecordError::Internal(format!(
            "expected an object, got {}",
            other
        ))),
    }
}
