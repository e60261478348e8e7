use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateConsultationRequest {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateConsultationStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema, FromRow)]
pub struct AdminConsultation {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub image_path: Option<String>,
    pub name: String,
    pub phone: String,
    pub content: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
