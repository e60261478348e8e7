use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

/// Multipart form accepted by product create and update. Every field arrives as text
/// except `image`, which is a file part.
#[derive(Debug, Default, ToSchema)]
pub struct ProductForm {
    pub name: Option<String>,
    pub part: Option<String>,
    pub brand: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub description: Option<String>,
    /// JSON object as text.
    pub specifications: Option<String>,
    /// Existing image reference, used when no file is uploaded.
    pub image_path: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<UploadedImage>,
}

#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub review_count: i64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductFacets {
    pub parts: Vec<String>,
    pub brands: Vec<String>,
}
