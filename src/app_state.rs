use sqlx::PgPool;
use std::sync::Arc;

use crate::services::queue::ScanQueue;

/// Shared application state passed to all route handlers.
///
/// Scans themselves run in the worker process; the API only reads the
/// database and pushes dispatch requests onto the queue.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<ScanQueue>,
}

impl AppState {
    pub fn new(db: PgPool, queue: ScanQueue) -> Self {
        Self {
            db,
            queue: Arc::new(queue),
        }
    }
}
