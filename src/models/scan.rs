use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::product::{Product, ProductImage};

/// Lifecycle of a catalog scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanStatus {
    Running,
    Completed,
    CompletedWithErrors,
}

/// One end-to-end pass over a shop's product catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub shop: String,
    pub status: ScanStatus,
    pub force_all: bool,
    pub total_products: i32,
    pub total_images: i32,
    pub missing_alt_text: i32,
    pub images_processed: i32,
    pub images_failed: i32,
    pub images_skipped: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregate counters written back to the scan row at completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanTotals {
    pub total_products: i32,
    pub total_images: i32,
    pub missing_alt_text: i32,
    pub images_processed: i32,
    pub images_failed: i32,
    pub images_skipped: i32,
}

impl ScanTotals {
    /// Terminal status for these aggregates: any failed image marks the
    /// whole scan `completed_with_errors`.
    pub fn terminal_status(&self) -> ScanStatus {
        if self.images_failed > 0 {
            ScanStatus::CompletedWithErrors
        } else {
            ScanStatus::Completed
        }
    }
}

/// Outcome of one image attempt within a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessedImageStatus {
    Success,
    Failed,
    Skipped,
}

/// Immutable per-image outcome record. Images skipped because alt text was
/// already present are counted on the scan but never recorded here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub product_id: String,
    pub product_title: String,
    pub image_id: String,
    pub image_url: String,
    pub previous_alt_text: Option<String>,
    pub new_alt_text: String,
    pub status: ProcessedImageStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a processed-image outcome row.
#[derive(Debug, Clone)]
pub struct NewProcessedImage {
    pub scan_id: Uuid,
    pub product_id: String,
    pub product_title: String,
    pub image_id: String,
    pub image_url: String,
    pub previous_alt_text: Option<String>,
    pub new_alt_text: String,
    pub status: ProcessedImageStatus,
    pub error_message: Option<String>,
}

impl NewProcessedImage {
    pub fn success(scan_id: Uuid, product: &Product, image: &ProductImage, new_alt: &str) -> Self {
        Self {
            scan_id,
            product_id: product.id.clone(),
            product_title: product.title.clone(),
            image_id: image.id.clone(),
            image_url: image.url.clone(),
            previous_alt_text: image.alt_text.clone(),
            new_alt_text: new_alt.to_string(),
            status: ProcessedImageStatus::Success,
            error_message: None,
        }
    }

    pub fn failed(scan_id: Uuid, product: &Product, image: &ProductImage, message: &str) -> Self {
        Self {
            scan_id,
            product_id: product.id.clone(),
            product_title: product.title.clone(),
            image_id: image.id.clone(),
            image_url: image.url.clone(),
            previous_alt_text: image.alt_text.clone(),
            new_alt_text: String::new(),
            status: ProcessedImageStatus::Failed,
            error_message: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_derived_from_failure_count() {
        let mut totals = ScanTotals {
            total_products: 3,
            total_images: 5,
            missing_alt_text: 4,
            images_processed: 4,
            images_failed: 0,
            images_skipped: 1,
        };
        assert_eq!(totals.terminal_status(), ScanStatus::Completed);

        totals.images_failed = 1;
        assert_eq!(totals.terminal_status(), ScanStatus::CompletedWithErrors);
    }

    #[test]
    fn status_wire_format_matches_database_values() {
        assert_eq!(ScanStatus::Running.to_string(), "running");
        assert_eq!(
            ScanStatus::CompletedWithErrors.to_string(),
            "completed_with_errors"
        );
        assert_eq!(
            "completed".parse::<ScanStatus>().ok(),
            Some(ScanStatus::Completed)
        );
        assert_eq!(ProcessedImageStatus::Skipped.to_string(), "skipped");
    }
}
