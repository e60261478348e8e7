use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::stats::{DailyOrders, Overview},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::stats_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/traffic", get(traffic))
}

pub fn traffic_router() -> Router<AppState> {
    Router::new().route("/ping", post(ping))
}

#[utoipa::path(
    get,
    path = "/api/stats/overview",
    responses(
        (status = 200, description = "Totals, revenue and best sellers", body = ApiResponse<Overview>),
        (status = 403, description = "Staff only")
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Overview>>> {
    let resp = stats_service::overview(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/stats/traffic",
    responses(
        (status = 200, description = "Orders per day over the last 30 days", body = ApiResponse<Vec<DailyOrders>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn traffic(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<DailyOrders>>>> {
    let resp = stats_service::traffic(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/traffic/ping",
    responses(
        (status = 200, description = "Page view acknowledged", body = ApiResponse<serde_json::Value>)
    ),
    tag = "Stats"
)]
pub async fn ping() -> Json<ApiResponse<serde_json::Value>> {
    tracing::trace!("page view");
    Json(ApiResponse::message("ok"))
}
