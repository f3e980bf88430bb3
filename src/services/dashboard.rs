//! Admin dashboard statistics

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::{EngineKind, UnifiedStore};
use crate::models::{Application, Citizen, Notification, Payment, PaymentStatus};
use crate::types::Result;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_citizens: usize,
    pub total_applications: usize,
    pub total_payments: usize,
    pub applications_by_status: BTreeMap<String, usize>,
    /// Sum of successful payments
    pub total_revenue: f64,
    pub unread_broadcasts: usize,
    pub engines: Vec<EngineKind>,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<UnifiedStore>,
}

impl DashboardService {
    pub fn new(store: Arc<UnifiedStore>) -> Self {
        Self { store }
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        let citizens: Vec<Citizen> = self.store.list().await?;
        let applications: Vec<Application> = self.store.list().await?;
        let payments: Vec<Payment> = self.store.list().await?;
        let notifications: Vec<Notification> = self.store.list().await?;

        let mut applications_by_status = BTreeMap::new();
        for application in &applications {
            *applications_by_status
                .entry(application.status.clone())
                .or_insert(0) += 1;
        }

        let total_revenue = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Success)
            .map(|p| p.amount)
            .sum();

        let unread_broadcasts = notifications
            .iter()
            .filter(|n| n.user_id.is_none() && !n.is_read)
            .count();

        Ok(DashboardStats {
            total_citizens: citizens.len(),
            total_applications: applications.len(),
            total_payments: payments.len(),
            applications_by_status,
            total_revenue,
            unread_broadcasts,
            engines: self.store.engine_status(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Collection, FlatFileStore};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stats_counts() {
        let dir = TempDir::new().unwrap();
        let fallback = Arc::new(FlatFileStore::open(dir.path()).await.unwrap());
        let store = Arc::new(UnifiedStore::flat_file_only(fallback));

        for (id, status) in [("DL1", "submitted"), ("DL2", "approved"), ("DL3", "approved")] {
            let record = json!({ "application_id": id, "service_type": "DL", "status": status });
            store
                .insert_record(Collection::Applications, record.as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        for (id, app, status) in [("PAY1", "DL2", "success"), ("PAY2", "DL3", "refunded")] {
            let record = json!({
                "payment_id": id,
                "application_id": app,
                "amount": 300.0,
                "status": status,
            });
            store
                .insert_record(Collection::Payments, record.as_object().cloned().unwrap())
                .await
                .unwrap();
        }

        let stats = DashboardService::new(store).stats().await.unwrap();
        assert_eq!(stats.total_citizens, 0);
        assert_eq!(stats.total_applications, 3);
        assert_eq!(stats.applications_by_status["approved"], 2);
        assert_eq!(stats.total_payments, 2);
        assert_eq!(stats.total_revenue, 300.0);
        assert_eq!(stats.engines, vec![EngineKind::FlatFile]);
    }
}
