//! Payment processing
//!
//! Single-pass: a payment is written as `success` straight away, then the application is
//! moved to `payment_received`. Failures after the payment is stored are logged and left
//! as they are.

use std::sync::Arc;
use tracing::{info, warn};

use crate::db::UnifiedStore;
use crate::models::{NewPayment, Payment, PaymentStatus, PaymentUpdate};
use crate::services::applications::SYSTEM_ACTOR;
use crate::services::{ApplicationService, IdGenerator};
use crate::types::{RecordError, RecordId, Result};

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<UnifiedStore>,
    applications: ApplicationService,
    ids: Arc<IdGenerator>,
}

impl PaymentService {
    pub fn new(store: Arc<UnifiedStore>, applications: ApplicationService, ids: Arc<IdGenerator>) -> Self {
        Self {
            store,
            applications,
            ids,
        }
    }

    /// Pay for an application. At most one payment per application.
    pub async fn add_payment(&self, input: NewPayment) -> Result<Payment> {
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(RecordError::Validation("amount must be greater than zero".into()));
        }
        if input.application_id.trim().is_empty() {
            return Err(RecordError::Validation("application_id is required".into()));
        }

        let application = self
            .applications
            .get(&RecordId::parse(input.application_id.trim()))
            .await?;

        if let Some(existing) = self.find_for_application(&application.application_id).await? {
            warn!(
                application_id = %application.application_id,
                payment_id = %existing.payment_id,
                "Duplicate payment rejected"
            );
            return Err(RecordError::PaymentExists {
                payment_id: existing.payment_id,
            });
        }

        let payment = Payment {
            native_id: None,
            payment_id: self.ids.payment_id(),
            application_id: application.application_id.clone(),
            amount: input.amount,
            payment_method: input.payment_method,
            transaction_id: self.ids.transaction_id(),
            status: PaymentStatus::Success,
            failure_reason: None,
            refund_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        // A concurrent payment for the same application loses on the unique index
        let stored = match self.store.add_payment(&payment).await {
            Ok(stored) => stored,
            Err(RecordError::Constraint(reason)) => {
                return match self.find_for_application(&application.application_id).await? {
                    Some(existing) => Err(RecordError::PaymentExists {
                        payment_id: existing.payment_id,
                    }),
                    None => Err(RecordError::Constraint(reason)),
                };
            }
            Err(e) => return Err(e),
        };

        info!(
            payment_id = %stored.payment_id,
            application_id = %stored.application_id,
            amount = stored.amount,
            "Payment recorded"
        );

        let reason = format!("Payment {} received", stored.payment_id);
        if let Err(e) = self
            .applications
            .update_status(
                &RecordId::logical(application.application_id),
                "payment_received",
                SYSTEM_ACTOR,
                Some(reason),
            )
            .await
        {
            warn!(payment_id = %stored.payment_id, error = %e, "Failed to mark application as paid");
        }

        Ok(stored)
    }

    /// Apply a gateway callback. A refund without a refund id gets one generated.
    pub async fn update_payment_status(&self, id: &RecordId, mut update: PaymentUpdate) -> Result<Payment> {
        if update.status == Some(PaymentStatus::Refunded) && update.refund_id.is_none() {
            update.refund_id = Some(self.ids.refund_id());
        }

        let updated = self
            .store
            .update_payment(id, &update)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("payment {}", id)))?;

        info!(
            payment_id = %updated.payment_id,
            status = updated.status.as_str(),
            "Payment status updated"
        );
        Ok(updated)
    }

    pub async fn get(&self, id: &RecordId) -> Result<Payment> {
        self.store
            .get_payment_by_id(id)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("payment {}", id)))
    }

    pub async fn get_for_application(&self, application_id: &RecordId) -> Result<Payment> {
        let application = self.applications.get(application_id).await?;
        self.find_for_application(&application.application_id)
            .await?
            .ok_or_else(|| {
                RecordError::NotFound(format!("payment for application {}", application.application_id))
            })
    }

    /// All payments, newest first
    pub async fn list(&self) -> Result<Vec<Payment>> {
        let mut payments = self.store.get_payments().await?;
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn find_for_application(&self, application_id: &str) -> Result<Option<Payment>> {
        let payments: Vec<Payment> = self.store.find_where("application_id", application_id).await?;
        Ok(payments.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FlatFileStore;
    use crate::models::{Application, NewApplication, Notification, NotificationType};
    use crate::services::NotificationService;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<UnifiedStore>,
        applications: ApplicationService,
        payments: PaymentService,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let fallback = Arc::new(FlatFileStore::open(dir.path()).await.unwrap());
        let store = Arc::new(UnifiedStore::flat_file_only(fallback));
        let ids = Arc::new(IdGenerator::new());
        let notifications = NotificationService::new(store.clone());
        let applications = ApplicationService::new(store.clone(), notifications, ids.clone());
        let payments = PaymentService::new(store.clone(), applications.clone(), ids);
        Fixture {
            _dir: dir,
            store,
            applications,
            payments,
        }
    }

    async fn submit(applications: &ApplicationService) -> Application {
        let input: NewApplication = serde_json::from_value(json!({
            "service_type": "DL",
            "citizen_id": "CIT1",
            "applicant_name": "Ravi Shankar",
        }))
        .unwrap();
        applications.submit(input).await.unwrap()
    }

    fn pay(application_id: &str, amount: f64) -> NewPayment {
        NewPayment {
            application_id: application_id.to_string(),
            amount,
            payment_method: "upi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_payment_moves_application_to_paid() {
        let f = fixture().await;
        let app = submit(&f.applications).await;

        let payment = f.payments.add_payment(pay(&app.application_id, 500.0)).await.unwrap();
        assert!(payment.payment_id.starts_with("PAY"));
        assert!(payment.transaction_id.starts_with("TXN"));
        assert_eq!(payment.status, PaymentStatus::Success);

        let id = RecordId::logical(&app.application_id);
        let paid = f.applications.get(&id).await.unwrap();
        assert_eq!(paid.status, "payment_received");

        let history = f.applications.history(&id).await.unwrap();
        assert_eq!(history.last().unwrap().new_status, "payment_received");

        let notifications: Vec<Notification> = f.store.list().await.unwrap();
        assert!(notifications
            .iter()
            .any(|n| n.title == "Payment Successful" && n.kind == NotificationType::Success));

        let found = f.payments.get_for_application(&id).await.unwrap();
        assert_eq!(found.payment_id, payment.payment_id);
    }

    #[tokio::test]
    async fn test_second_payment_is_rejected() {
        let f = fixture().await;
        let app = submit(&f.applications).await;
        let first = f.payments.add_payment(pay(&app.application_id, 500.0)).await.unwrap();

        let err = f
            .payments
            .add_payment(pay(&app.application_id, 500.0))
            .await
            .unwrap_err();
        match err {
            RecordError::PaymentExists { payment_id } => assert_eq!(payment_id, first.payment_id),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.payments.list().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_payments_keep_one() {
        let f = fixture().await;
        let app = submit(&f.applications).await;

        let (a, b) = tokio::join!(
            f.payments.add_payment(pay(&app.application_id, 500.0)),
            f.payments.add_payment(pay(&app.application_id, 500.0)),
        );
        let (winner, loser) = match (a, b) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            (a, b) => panic!("expected exactly one payment, got {:?} and {:?}", a.is_ok(), b.is_ok()),
        };
        match loser {
            RecordError::PaymentExists { payment_id } => assert_eq!(payment_id, winner.payment_id),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.payments.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_rejects_second_payment_row() {
        let f = fixture().await;
        let app = submit(&f.applications).await;
        f.payments.add_payment(pay(&app.application_id, 500.0)).await.unwrap();

        let duplicate = Payment {
            native_id: None,
            payment_id: "PAY2".to_string(),
            application_id: app.application_id.clone(),
            amount: 10.0,
            payment_method: String::new(),
            transaction_id: "TXN2".to_string(),
            status: PaymentStatus::Success,
            failure_reason: None,
            refund_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let err = f.store.add_payment(&duplicate).await.unwrap_err();
        assert!(matches!(err, RecordError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_invalid_payments() {
        let f = fixture().await;
        let app = submit(&f.applications).await;

        let err = f.payments.add_payment(pay(&app.application_id, 0.0)).await.unwrap_err();
        assert!(matches!(err, RecordError::Validation(_)));

        let err = f.payments.add_payment(pay("DL0", 100.0)).await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refund_gets_refund_id() {
        let f = fixture().await;
        let app = submit(&f.applications).await;
        let payment = f.payments.add_payment(pay(&app.application_id, 250.0)).await.unwrap();

        let refunded = f
            .payments
            .update_payment_status(
                &RecordId::logical(&payment.payment_id),
                PaymentUpdate {
                    status: Some(PaymentStatus::Refunded),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert!(refunded.refund_id.unwrap().starts_with("RFD"));
        assert_eq!(refunded.amount, 250.0);
    }
}
