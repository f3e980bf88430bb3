//! Services layer
//!
//! Business logic on top of the unified record store.
//!
//! ## Services
//!
//! - **Applications**: submission and the status state machine
//! - **Payments**: one payment per application, moves it to `payment_received`
//! - **Notifications**: per-user inbox and admin broadcasts
//! - **Dashboard**: admin statistics

pub mod applications;
pub mod dashboard;
pub mod ids;
pub mod notifications;
pub mod payments;

pub use applications::{ApplicationFilter, ApplicationService};
pub use dashboard::{DashboardService, DashboardStats};
pub use ids::{service_prefix, IdGenerator};
pub use notifications::NotificationService;
pub use payments::PaymentService;

use std::sync::Arc;

use crate::db::UnifiedStore;

/// Every service wired to one store
#[derive(Clone)]
pub struct Services {
    pub ids: Arc<IdGenerator>,
    pub applications: ApplicationService,
    pub payments: PaymentService,
    pub notifications: NotificationService,
    pub dashboard: DashboardService,
}

impl Services {
    pub fn new(store: Arc<UnifiedStore>) -> Self {
        let ids = Arc::new(IdGenerator::new());
        let notifications = NotificationService::new(store.clone());
        let applications =
            ApplicationService::new(store.clone(), notifications.clone(), ids.clone());
        let payments = PaymentService::new(store.clone(), applications.clone(), ids.clone());
        let dashboard = DashboardService::new(store);

        Self {
            ids,
            applications,
            payments,
            notifications,
            dashboard,
        }
    }
}
