use serde::{Deserialize, Serialize};

/// A product pulled from the catalog platform, carrying its image media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Platform GID, e.g. `gid://shopify/Product/123`.
    pub id: String,
    pub title: String,
    pub handle: String,
    pub tags: Vec<String>,
    pub images: Vec<ProductImage>,
}

/// One image attachment on a product, identified independently of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    /// Platform media GID, e.g. `gid://shopify/MediaImage/456`.
    pub id: String,
    pub url: String,
    pub alt_text: Option<String>,
}

impl ProductImage {
    /// Whether this image already carries non-empty alt text.
    pub fn has_alt_text(&self) -> bool {
        self.alt_text
            .as_deref()
            .is_some_and(|alt| !alt.trim().is_empty())
    }
}

/// One page of the cursor-paginated product listing.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Field-level rejection returned by the media-update mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Vec<String>,
    pub message: String,
}
