use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema, FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub part: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Overview {
    pub users: i64,
    pub orders: i64,
    pub products: i64,
    pub revenue: i64,
    pub top_week: Vec<TopProduct>,
    pub top_month: Vec<TopProduct>,
}

#[derive(Debug, Serialize, ToSchema, FromRow)]
pub struct DailyOrders {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: i64,
}
