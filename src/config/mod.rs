use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Prometheus scrape address for the worker process
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the scan dispatch queue
    pub redis_url: String,

    /// AI captioning provider API key. Missing key is a startup error.
    pub openai_api_key: String,

    /// Vision-capable model used for captioning
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Shopify Admin API access token
    pub shopify_access_token: String,

    /// Shopify Admin API version segment
    #[serde(default = "default_shopify_api_version")]
    pub shopify_api_version: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9091".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_shopify_api_version() -> String {
    "2024-07".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
