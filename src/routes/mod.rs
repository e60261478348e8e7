use axum::{Json, Router, http::StatusCode};

use crate::{response::ApiResponse, state::AppState};

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod consultations;
pub mod diagnose;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod reviews;
pub mod stats;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/user/addresses", addresses::router())
        .nest("/reviews", reviews::router())
        .nest("/consultations", consultations::router())
        .nest("/admin", admin::router())
        .nest("/stats", stats::router())
        .nest("/traffic", stats::traffic_router())
        .nest("/ml", diagnose::router())
        .fallback(api_not_found)
}

/// Unknown `/api/*` paths answer with the JSON envelope instead of the SPA.
pub async fn api_not_found() -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::message("Route not found")),
    )
}
