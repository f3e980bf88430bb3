//! Payments against applications

use serde::{Deserialize, Serialize};

use crate::db::Collection;
use crate::models::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Refunded,
    Processing,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Processing => "processing",
        }
    }
}

/// Payment record; at most one per application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,

    pub payment_id: String,
    pub application_id: String,
    pub amount: f64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Entity for Payment {
    const COLLECTION: Collection = Collection::Payments;

    fn logical_id(&self) -> &str {
        &self.payment_id
    }
}

/// Payment request
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    #[serde(alias = "applicationId")]
    pub application_id: String,
    pub amount: f64,
    #[serde(default = "default_method", alias = "paymentMethod")]
    pub payment_method: String,
}

fn default_method() -> String {
    "upi".to_string()
}

/// Gateway-callback style status change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_payment_accepts_camel_case() {
        let input: NewPayment = serde_json::from_value(json!({
            "applicationId": "DL1",
            "amount": 500.0,
        }))
        .unwrap();
        assert_eq!(input.application_id, "DL1");
        assert_eq!(input.payment_method, "upi");
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_value(PaymentStatus::Refunded).unwrap(), json!("refunded"));
        assert_eq!(PaymentStatus::Success.as_str(), "success");
    }
}
