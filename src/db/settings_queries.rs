use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::settings::{CaptionLength, CaptionStyle, SettingsUpdate, ShopSettings};

fn row_to_settings(row: &PgRow) -> Result<ShopSettings, sqlx::Error> {
    let style: String = row.try_get("alt_text_style")?;
    let length: String = row.try_get("alt_text_length")?;
    Ok(ShopSettings {
        id: row.try_get("id")?,
        shop: row.try_get("shop")?,
        alt_text_style: style.parse().unwrap_or(CaptionStyle::Professional),
        alt_text_length: length.parse().unwrap_or(CaptionLength::Medium),
        custom_prompt: row.try_get("custom_prompt")?,
        batch_size: row.try_get("batch_size")?,
        auto_retry: row.try_get("auto_retry")?,
        max_retries: row.try_get("max_retries")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Fetch a shop's settings, lazily creating the default row on first read
pub async fn get_or_create(pool: &PgPool, shop: &str) -> Result<ShopSettings, sqlx::Error> {
    sqlx::query("INSERT INTO shop_settings (shop) VALUES ($1) ON CONFLICT (shop) DO NOTHING")
        .bind(shop)
        .execute(pool)
        .await?;

    let row = sqlx::query(
        r#"
        SELECT id, shop, alt_text_style, alt_text_length, custom_prompt,
               batch_size, auto_retry, max_retries, created_at, updated_at
        FROM shop_settings
        WHERE shop = $1
        "#,
    )
    .bind(shop)
    .fetch_one(pool)
    .await?;

    row_to_settings(&row)
}

/// Replace a shop's settings, creating the row if absent
pub async fn upsert(pool: &PgPool, update: &SettingsUpdate) -> Result<ShopSettings, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO shop_settings (shop, alt_text_style, alt_text_length, custom_prompt,
                                   batch_size, auto_retry, max_retries)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (shop) DO UPDATE
        SET alt_text_style = EXCLUDED.alt_text_style,
            alt_text_length = EXCLUDED.alt_text_length,
            custom_prompt = EXCLUDED.custom_prompt,
            batch_size = EXCLUDED.batch_size,
            auto_retry = EXCLUDED.auto_retry,
            max_retries = EXCLUDED.max_retries,
            updated_at = NOW()
        RETURNING id, shop, alt_text_style, alt_text_length, custom_prompt,
                  batch_size, auto_retry, max_retries, created_at, updated_at
        "#,
    )
    .bind(&update.shop)
    .bind(update.alt_text_style.to_string())
    .bind(update.alt_text_length.to_string())
    .bind(&update.custom_prompt)
    .bind(update.batch_size)
    .bind(update.auto_retry)
    .bind(update.max_retries)
    .fetch_one(pool)
    .await?;

    row_to_settings(&row)
}
