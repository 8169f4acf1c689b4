pub mod account_service;
pub mod approval_service;
pub mod audit;
pub mod betting_service;
pub mod config_service;
pub mod market_service;
pub mod notifier;
pub mod settlement;
pub mod unit_of_work;

pub use account_service::AccountService;
pub use approval_service::ApprovalService;
pub use audit::{AuditLogEntry, AuditTrailService};
pub use betting_service::BettingService;
pub use config_service::ConfigService;
pub use market_service::MarketService;
pub use notifier::{LogNotifier, NotificationHub, Notifier};
pub use settlement::SettlementService;
pub use unit_of_work::UnitOfWork;

use crate::error::AppResult;
use sqlx::PgPool;
use std::sync::Arc;

/// Handles shared by every transactional service
#[derive(Clone)]
pub struct ServiceContext {
    pub pool: PgPool,
    pub config: Arc<ConfigService>,
    pub notifier: Arc<dyn Notifier>,
}

impl ServiceContext {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config: Arc::new(ConfigService::new(pool.clone())),
            pool,
            notifier,
        }
    }

    pub async fn begin(&self) -> AppResult<UnitOfWork> {
        UnitOfWork::begin(&self.pool).await
    }

    /// Commit the unit of work, then deliver its notifications
    pub async fn finish(&self, uow: UnitOfWork) -> AppResult<()> {
        let mut book = uow.commit().await?;
        for notification in book.take_notifications() {
            self.notifier.notify(&notification);
        }
        Ok(())
    }
}
