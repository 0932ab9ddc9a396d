use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a dead-letter entry.
///
/// `pending -> retrying -> pending (rescheduled)` until the retry budget is
/// spent, at which point the entry becomes `failed_permanent` and is excluded
/// from future sweeps. Rows are deleted only on successful reprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailedJobStatus {
    Pending,
    Retrying,
    FailedPermanent,
}

/// An image whose caption generation or write-back failed, parked for
/// scheduled background retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJob {
    pub id: Uuid,
    pub shop: String,
    pub product_id: String,
    pub product_title: String,
    pub image_id: String,
    pub image_url: String,
    pub error_message: String,
    pub status: FailedJobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a dead-letter entry.
#[derive(Debug, Clone)]
pub struct NewFailedJob {
    pub shop: String,
    pub product_id: String,
    pub product_title: String,
    pub image_id: String,
    pub image_url: String,
    pub error_message: String,
    pub max_retries: i32,
}

/// State transition applied by a reschedule: bump the retry count, and once
/// it reaches the ceiling the job is terminally failed instead of going back
/// to `pending`.
pub fn reschedule_transition(retry_count: i32, max_retries: i32) -> (i32, FailedJobStatus) {
    let bumped = retry_count + 1;
    if bumped >= max_retries {
        (bumped, FailedJobStatus::FailedPermanent)
    } else {
        (bumped, FailedJobStatus::Pending)
    }
}
