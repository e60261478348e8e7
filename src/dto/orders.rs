use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderLine};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutItem {
    #[serde(alias = "pid")]
    pub product_id: Uuid,
    #[serde(alias = "qty")]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeliveryInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InstallationChoice {
    /// `self` or `home`.
    pub method: String,
    /// Requested installation slot for home installation.
    pub time: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub info: Option<DeliveryInfo>,
    /// Payment method; only `cod` is accepted.
    pub method: Option<String>,
    pub installation: Option<InstallationChoice>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<OrderWithItems>)]
    pub items: Vec<OrderWithItems>,
}
