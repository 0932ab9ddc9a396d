//! Persistence seam for the scan orchestrator.
//!
//! The orchestrator only ever touches the store through [`ScanStore`], which
//! keeps the pipeline testable against an in-memory implementation. The
//! production implementation delegates to the query modules.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{failed_job_queries, scan_queries, settings_queries};
use crate::models::failed_job::NewFailedJob;
use crate::models::scan::{NewProcessedImage, Scan, ScanStatus, ScanTotals};
use crate::models::settings::ShopSettings;

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn create_scan(&self, shop: &str, force_all: bool) -> Result<Scan, sqlx::Error>;

    async fn finalize_scan(
        &self,
        scan_id: Uuid,
        totals: &ScanTotals,
        status: ScanStatus,
    ) -> Result<(), sqlx::Error>;

    async fn shop_settings(&self, shop: &str) -> Result<ShopSettings, sqlx::Error>;

    async fn record_image(&self, record: &NewProcessedImage) -> Result<(), sqlx::Error>;

    async fn enqueue_failed(&self, job: &NewFailedJob) -> Result<(), sqlx::Error>;
}

/// Postgres-backed [`ScanStore`].
pub struct PgScanStore {
    pool: PgPool,
}

impl PgScanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanStore for PgScanStore {
    async fn create_scan(&self, shop: &str, force_all: bool) -> Result<Scan, sqlx::Error> {
        scan_queries::create_scan(&self.pool, shop, force_all).await
    }

    async fn finalize_scan(
        &self,
        scan_id: Uuid,
        totals: &ScanTotals,
        status: ScanStatus,
    ) -> Result<(), sqlx::Error> {
        scan_queries::finalize_scan(&self.pool, scan_id, totals, status).await
    }

    async fn shop_settings(&self, shop: &str) -> Result<ShopSettings, sqlx::Error> {
        settings_queries::get_or_create(&self.pool, shop).await
    }

    async fn record_image(&self, record: &NewProcessedImage) -> Result<(), sqlx::Error> {
        scan_queries::record_image(&self.pool, record).await?;
        Ok(())
    }

    async fn enqueue_failed(&self, job: &NewFailedJob) -> Result<(), sqlx::Error> {
        failed_job_queries::enqueue(&self.pool, job).await?;
        Ok(())
    }
}
