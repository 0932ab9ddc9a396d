use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Tone the generated alt text should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaptionStyle {
    Professional,
    Casual,
    Technical,
    Creative,
}

impl CaptionStyle {
    /// Style directive embedded into the synthesized prompt.
    pub fn directive(&self) -> &'static str {
        match self {
            CaptionStyle::Professional => {
                "Use clear, polished language suitable for a retail storefront."
            }
            CaptionStyle::Casual => "Use a relaxed, conversational tone.",
            CaptionStyle::Technical => {
                "Focus on concrete attributes: materials, dimensions, finish."
            }
            CaptionStyle::Creative => "Use vivid, evocative language that sells the scene.",
        }
    }
}

/// Length class for generated captions, mapped to a character ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaptionLength {
    Short,
    Medium,
    Long,
}

impl CaptionLength {
    pub fn max_chars(&self) -> usize {
        match self {
            CaptionLength::Short => 60,
            CaptionLength::Medium => 100,
            CaptionLength::Long => 125,
        }
    }
}

/// Per-shop configuration, one row per shop. Lazily created with defaults on
/// first read, upserted on save, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSettings {
    pub id: Uuid,
    pub shop: String,
    pub alt_text_style: CaptionStyle,
    pub alt_text_length: CaptionLength,
    pub custom_prompt: Option<String>,
    /// Advisory concurrency hint (1-10). Processing is currently strictly
    /// sequential; the field is stored and surfaced but not acted on.
    pub batch_size: i32,
    pub auto_retry: bool,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings save payload from the admin settings screen.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SettingsUpdate {
    #[garde(length(min = 1, max = 255))]
    pub shop: String,

    #[garde(skip)]
    pub alt_text_style: CaptionStyle,

    #[garde(skip)]
    pub alt_text_length: CaptionLength,

    #[garde(inner(length(min = 1, max = 2000)))]
    pub custom_prompt: Option<String>,

    #[garde(range(min = 1, max = 10))]
    pub batch_size: i32,

    #[garde(skip)]
    pub auto_retry: bool,

    #[garde(range(min = 1, max = 10))]
    pub max_retries: i32,
}
