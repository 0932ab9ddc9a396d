//! Shopify Admin GraphQL client
//!
//! Pulls the product catalog (cursor pagination, 250 products per page, first
//! 10 media images each) and writes generated alt text back through
//! `productUpdateMedia`. Response parsing lives in standalone functions so it
//! can be exercised against canned payloads without a live store.

use async_stream::try_stream;
use futures_util::pin_mut;
use futures_util::stream::{Stream, TryStreamExt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::models::product::{Product, ProductImage, ProductPage, UserError};

/// Products fetched per GraphQL page.
pub const PAGE_SIZE: u32 = 250;

/// Media entries requested per product.
const IMAGES_PER_PRODUCT: u32 = 10;

const PRODUCTS_QUERY: &str = r#"
query ProductCatalog($first: Int!, $after: String, $mediaFirst: Int!) {
  products(first: $first, after: $after) {
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      node {
        id
        title
        handle
        tags
        media(first: $mediaFirst) {
          edges {
            node {
              ... on MediaImage {
                id
                image {
                  url
                  altText
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const UPDATE_MEDIA_MUTATION: &str = r#"
mutation UpdateImageAlt($productId: ID!, $media: [UpdateMediaInput!]!) {
  productUpdateMedia(productId: $productId, media: $media) {
    media {
      ... on MediaImage {
        id
      }
    }
    mediaUserErrors {
      field
      message
    }
  }
}
"#;

/// Error type for Shopify Admin API operations.
#[derive(Debug, thiserror::Error)]
pub enum ShopifyError {
    #[error("Shopify request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Shopify API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Shopify GraphQL error: {0}")]
    GraphQl(String),

    #[error("failed to parse Shopify response: {0}")]
    Parse(String),
}

/// Catalog operations the scan orchestrator depends on. Production code uses
/// [`ShopifyClient`]; tests substitute an in-memory catalog.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the shop's product catalog from `start_cursor` onward
    /// (`None` = the whole catalog), draining every remaining page.
    async fn fetch_all_products(
        &self,
        shop: &str,
        start_cursor: Option<&str>,
    ) -> Result<Vec<Product>, ShopifyError>;

    /// Write alt text to one product image. `Ok` carries the platform's
    /// per-field validation errors, which are empty on a clean write.
    async fn update_image_alt(
        &self,
        shop: &str,
        product_id: &str,
        image_id: &str,
        alt_text: &str,
    ) -> Result<Vec<UserError>, ShopifyError>;
}

/// Client for the Shopify Admin GraphQL API.
///
/// The shop domain is supplied per call, so one client serves every
/// installed store.
pub struct ShopifyClient {
    http: reqwest::Client,
    access_token: String,
    api_version: String,
}

impl ShopifyClient {
    pub fn new(
        access_token: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self, ShopifyError> {
        let http = reqwest::Client::builder()
            .user_agent("alt-text-engine/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            access_token: access_token.into(),
            api_version: api_version.into(),
        })
    }

    fn endpoint(&self, shop: &str) -> String {
        format!(
            "https://{}/admin/api/{}/graphql.json",
            shop, self.api_version
        )
    }

    /// POST one GraphQL document and return the raw response body.
    async fn execute(&self, shop: &str, payload: serde_json::Value) -> Result<String, ShopifyError> {
        let response = self
            .http
            .post(self.endpoint(shop))
            .header("X-Shopify-Access-Token", &self.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShopifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.text().await?)
    }

    /// Fetch a single catalog page at `cursor` (`None` = first page).
    pub async fn fetch_page(
        &self,
        shop: &str,
        cursor: Option<&str>,
    ) -> Result<ProductPage, ShopifyError> {
        let body = self.execute(shop, products_payload(cursor)).await?;
        parse_products_page(&body)
    }

    /// Lazily paginate the catalog from `start_cursor` (`None` = the first
    /// page). Each item is one page; the stream ends after the page with
    /// `hasNextPage: false` and short-circuits on the first request or
    /// parse failure.
    pub fn product_pages<'a>(
        &'a self,
        shop: &'a str,
        start_cursor: Option<&'a str>,
    ) -> impl Stream<Item = Result<ProductPage, ShopifyError>> + 'a {
        try_stream! {
            let mut cursor: Option<String> = start_cursor.map(str::to_owned);
            loop {
                let page = self.fetch_page(shop, cursor.as_deref()).await?;
                let has_next = page.has_next_page;
                cursor.clone_from(&page.end_cursor);
                yield page;
                if !has_next {
                    break;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl CatalogSource for ShopifyClient {
    async fn fetch_all_products(
        &self,
        shop: &str,
        start_cursor: Option<&str>,
    ) -> Result<Vec<Product>, ShopifyError> {
        let pages = self.product_pages(shop, start_cursor);
        pin_mut!(pages);

        let mut products = Vec::new();
        let mut page_count = 0u32;
        while let Some(page) = pages.try_next().await? {
            page_count += 1;
            products.extend(page.products);
            tracing::debug!(
                shop,
                page = page_count,
                products = products.len(),
                "fetched catalog page"
            );
        }
        Ok(products)
    }

    async fn update_image_alt(
        &self,
        shop: &str,
        product_id: &str,
        image_id: &str,
        alt_text: &str,
    ) -> Result<Vec<UserError>, ShopifyError> {
        let payload = json!({
            "query": UPDATE_MEDIA_MUTATION,
            "variables": {
                "productId": product_id,
                "media": [{ "id": image_id, "alt": alt_text }],
            },
        });
        let body = self.execute(shop, payload).await?;
        parse_media_user_errors(&body)
    }
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

#[derive(Deserialize)]
struct ProductsData {
    products: ProductConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductConnection {
    page_info: PageInfo,
    edges: Vec<Edge<ProductNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Deserialize)]
struct ProductNode {
    id: String,
    title: String,
    handle: String,
    #[serde(default)]
    tags: Vec<String>,
    media: MediaConnection,
}

#[derive(Deserialize)]
struct MediaConnection {
    edges: Vec<Edge<MediaNode>>,
}

/// Inline-fragment node: non-image media (video, 3D models) deserializes
/// with both fields absent and is dropped during mapping.
#[derive(Deserialize, Default)]
struct MediaNode {
    id: Option<String>,
    image: Option<ImageInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageInfo {
    url: String,
    alt_text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMediaData {
    product_update_media: Option<UpdateMediaPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMediaPayload {
    #[serde(default)]
    media_user_errors: Vec<UserError>,
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ShopifyError> {
    let response: GraphQlResponse<T> =
        serde_json::from_str(body).map_err(|e| ShopifyError::Parse(e.to_string()))?;

    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(ShopifyError::GraphQl(messages.join("; ")));
    }

    response
        .data
        .ok_or_else(|| ShopifyError::Parse("response carried no data".to_string()))
}

/// Request body for one catalog page at `cursor` (`None` = first page).
pub(crate) fn products_payload(cursor: Option<&str>) -> serde_json::Value {
    json!({
        "query": PRODUCTS_QUERY,
        "variables": {
            "first": PAGE_SIZE,
            "after": cursor,
            "mediaFirst": IMAGES_PER_PRODUCT,
        },
    })
}

/// Map one products-query response body to a [`ProductPage`].
pub(crate) fn parse_products_page(body: &str) -> Result<ProductPage, ShopifyError> {
    let data: ProductsData = decode(body)?;
    let connection = data.products;

    let products = connection
        .edges
        .into_iter()
        .map(|edge| {
            let node = edge.node;
            let images = node
                .media
                .edges
                .into_iter()
                .filter_map(|media| {
                    let media = media.node;
                    match (media.id, media.image) {
                        (Some(id), Some(image)) => Some(ProductImage {
                            id,
                            url: image.url,
                            alt_text: image.alt_text,
                        }),
                        _ => None,
                    }
                })
                .collect();
            Product {
                id: node.id,
                title: node.title,
                handle: node.handle,
                tags: node.tags,
                images,
            }
        })
        .collect();

    Ok(ProductPage {
        products,
        has_next_page: connection.page_info.has_next_page,
        end_cursor: connection.page_info.end_cursor,
    })
}

/// Extract `mediaUserErrors` from a `productUpdateMedia` response body.
pub(crate) fn parse_media_user_errors(body: &str) -> Result<Vec<UserError>, ShopifyError> {
    let data: UpdateMediaData = decode(body)?;
    let payload = data
        .product_update_media
        .ok_or_else(|| ShopifyError::Parse("productUpdateMedia payload missing".to_string()))?;
    Ok(payload.media_user_errors)
}
