//! Caption generation: prompt construction, the provider retry loop, and
//! output sanitation.
//!
//! One call produces one SEO-ready alt-text sentence for one image, or fails
//! after the configured number of attempts. Rate-limited attempts back off
//! exponentially; every other failure retries on a short linear ramp. The
//! caller persists outcomes — nothing here touches scan state.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;

use crate::db::settings_queries;
use crate::models::settings::{CaptionStyle, ShopSettings};
use crate::services::retry;
use crate::services::vision::{CaptionProvider, VisionError};

/// Everything the generator needs to caption one product image.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub shop: String,
    pub image_url: String,
    pub product_title: String,
    pub tags: Vec<String>,
    /// Total attempts allowed against the provider (minimum 1).
    pub max_retries: u32,
}

/// Seam the scan orchestrator and retry worker call through; tests swap in
/// scripted fakes.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    async fn generate(&self, request: &CaptionRequest) -> Result<String, CaptionError>;
}

/// Production caption generator: resolves the shop's style settings, then
/// drives the provider retry loop.
pub struct CaptionGenerator {
    pool: PgPool,
    provider: Arc<dyn CaptionProvider>,
}

impl CaptionGenerator {
    pub fn new(pool: PgPool, provider: Arc<dyn CaptionProvider>) -> Self {
        Self { pool, provider }
    }
}

#[async_trait]
impl CaptionSource for CaptionGenerator {
    async fn generate(&self, request: &CaptionRequest) -> Result<String, CaptionError> {
        let settings = settings_queries::get_or_create(&self.pool, &request.shop).await?;
        let started = Instant::now();
        let result = generate_with_settings(self.provider.as_ref(), &settings, request).await;
        if result.is_ok() {
            metrics::histogram!("caption_generation_seconds")
                .record(started.elapsed().as_secs_f64());
        }
        result
    }
}

/// Retry loop over the provider with resolved settings.
///
/// Attempts run `0..max_retries`. A failed attempt waits on the rate-limit
/// backoff schedule when the provider signalled throttling, otherwise on the
/// linear ramp; the final attempt never waits. The terminal error reflects
/// the classification of the *last* failure.
pub(crate) async fn generate_with_settings(
    provider: &dyn CaptionProvider,
    settings: &ShopSettings,
    request: &CaptionRequest,
) -> Result<String, CaptionError> {
    let ceiling = settings.alt_text_length.max_chars();
    let prompt = match settings.custom_prompt.as_deref() {
        Some(custom) => custom.to_string(),
        None => build_prompt(
            &request.product_title,
            &request.tags,
            settings.alt_text_style,
            ceiling,
        ),
    };

    let max_retries = request.max_retries.max(1);
    let mut last_rate_limited = false;
    let mut last_message = String::new();

    for attempt in 0..max_retries {
        match provider.caption_image(&request.image_url, &prompt).await {
            Ok(raw) => return Ok(sanitize_caption(&raw, ceiling)),
            Err(e) => {
                last_rate_limited = e.is_rate_limit();
                last_message = e.to_string();

                if attempt + 1 < max_retries {
                    let delay = if last_rate_limited {
                        retry::backoff_delay(attempt)
                    } else {
                        retry::linear_delay(attempt)
                    };
                    tracing::warn!(
                        shop = %request.shop,
                        image_url = %request.image_url,
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        rate_limited = last_rate_limited,
                        error = %last_message,
                        "caption attempt failed, backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    Err(if last_rate_limited {
        CaptionError::RateLimited {
            attempts: max_retries,
            message: last_message,
        }
    } else {
        CaptionError::Exhausted {
            attempts: max_retries,
            message: last_message,
        }
    })
}

/// Synthesize the captioning prompt from product context and shop style.
fn build_prompt(title: &str, tags: &[String], style: CaptionStyle, ceiling: usize) -> String {
    let tag_clause = if tags.is_empty() {
        String::new()
    } else {
        format!(" Product tags: {}.", tags.join(", "))
    };
    format!(
        "Write SEO-friendly alt text for this product image. \
         Product title: {title}.{tag_clause} {directive} \
         Keep it under {ceiling} characters. \
         Respond with exactly one plain sentence, with no surrounding quotes \
         and no commentary.",
        directive = style.directive(),
    )
}

const QUOTE_CHARS: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Clean a raw completion into storable alt text: trim, strip one layer of
/// surrounding quotes, collapse whitespace runs, and cap the length at the
/// configured ceiling (truncating to `ceiling - 3` plus an ellipsis).
pub(crate) fn sanitize_caption(raw: &str, ceiling: usize) -> String {
    let trimmed = raw.trim();
    let unquoted = strip_quote_layer(trimmed);
    let collapsed = unquoted.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() > ceiling {
        let mut truncated: String = collapsed.chars().take(ceiling.saturating_sub(3)).collect();
        truncated.push_str("...");
        truncated
    } else {
        collapsed
    }
}

/// Remove at most one leading and one trailing quote character.
fn strip_quote_layer(s: &str) -> &str {
    let s = s.strip_prefix(QUOTE_CHARS).unwrap_or(s);
    s.strip_suffix(QUOTE_CHARS).unwrap_or(s)
}

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("AI provider rate limited after {attempts} attempts: {message}")]
    RateLimited { attempts: u32, message: String },

    #[error("caption generation failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("settings lookup failed: {0}")]
    Settings(#[from] sqlx::Error),
}
