use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000, message = "comment is too long"))]
    pub comment: String,
}

/// Review as listed in the back office, with the product it belongs to.
#[derive(Debug, Serialize, ToSchema, FromRow)]
pub struct AdminReview {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
