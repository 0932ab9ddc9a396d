use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Seam to the image-captioning provider. The production implementation
/// fetches the image bytes itself and calls the OpenAI vision endpoint;
/// tests substitute fakes that skip the network entirely.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Produce one free-text completion for the image at `image_url`.
    /// The raw completion is returned unsanitized; it may be empty.
    async fn caption_image(&self, image_url: &str, prompt: &str) -> Result<String, VisionError>;
}

/// Client for OpenAI-compatible chat-completions vision models.
pub struct OpenAiVision {
    http: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiVision {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_endpoint(api_key, model, DEFAULT_ENDPOINT.to_string())
    }

    /// Create with a custom endpoint (OpenAI-compatible proxies, test servers).
    pub fn with_endpoint(api_key: String, model: String, endpoint: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model,
            endpoint,
        }
    }

    /// Download the raw image bytes, sniffing the media type from the magic
    /// bytes so the data URL matches what the CDN actually served.
    async fn fetch_image(&self, url: &str) -> Result<(Vec<u8>, &'static str), VisionError> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VisionError::ImageFetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VisionError::ImageFetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let media_type = media_type_for(&bytes);
        Ok((bytes.to_vec(), media_type))
    }
}

#[async_trait]
impl CaptionProvider for OpenAiVision {
    async fn caption_image(&self, image_url: &str, prompt: &str) -> Result<String, VisionError> {
        let (bytes, media_type) = self.fetch_image(image_url).await?;
        let data_url = format!(
            "data:{media_type};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: 200,
            temperature: 0.4,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ChatContent::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                    ChatContent::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| VisionError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatResponse = response.json().await.map_err(|e| VisionError::Parse {
            message: e.to_string(),
        })?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// Sniff the image media type from its magic bytes. Unknown formats fall
/// back to JPEG, which the vision endpoint tolerates.
fn media_type_for(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Gif) => "image/gif",
        _ => "image/jpeg",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("image fetch failed for {url}: {message}")]
    ImageFetch { url: String, message: String },

    #[error("AI provider request failed: {message}")]
    Request { message: String },

    #[error("AI provider HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("failed to parse AI provider response: {message}")]
    Parse { message: String },
}

impl VisionError {
    /// Rate limiting is signalled either by an explicit 429 status or by
    /// rate-limit phrasing in the error body.
    pub fn is_rate_limit(&self) -> bool {
        if let VisionError::Provider { status: 429, .. } = self {
            return true;
        }
        let lower = self.to_string().to_lowercase();
        lower.contains("rate limit") || lower.contains("too many requests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_sniffed_from_magic_bytes() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(media_type_for(&png), "image/png");

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0];
        assert_eq!(media_type_for(&jpeg), "image/jpeg");

        let mut webp = Vec::from(*b"RIFF");
        webp.extend_from_slice(&[0x20, 0, 0, 0]);
        webp.extend_from_slice(b"WEBPVP8 ");
        assert_eq!(media_type_for(&webp), "image/webp");

        assert_eq!(media_type_for(b"not an image"), "image/jpeg");
    }

    #[test]
    fn explicit_429_is_rate_limit() {
        let err = VisionError::Provider {
            status: 429,
            message: "quota".to_string(),
        };
        assert!(err.is_rate_limit());
    }

    #[test]
    fn rate_limit_phrasing_is_rate_limit() {
        let err = VisionError::Request {
            message: "Rate limit reached for gpt-4o-mini".to_string(),
        };
        assert!(err.is_rate_limit());

        let err = VisionError::Provider {
            status: 503,
            message: "Too Many Requests queued upstream".to_string(),
        };
        assert!(err.is_rate_limit());
    }

    #[test]
    fn server_errors_are_not_rate_limits() {
        let err = VisionError::Provider {
            status: 500,
            message: "internal error".to_string(),
        };
        assert!(!err.is_rate_limit());

        let err = VisionError::ImageFetch {
            url: "https://cdn.example.com/a.jpg".to_string(),
            message: "404 Not Found".to_string(),
        };
        assert!(!err.is_rate_limit());
    }
}
