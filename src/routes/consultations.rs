use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::consultations::CreateConsultationRequest,
    error::AppResult,
    models::Consultation,
    response::ApiResponse,
    services::consultation_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create_consultation))
}

#[utoipa::path(
    post,
    path = "/api/consultations",
    request_body = CreateConsultationRequest,
    responses(
        (status = 201, description = "Consultation request received", body = ApiResponse<Consultation>),
        (status = 400, description = "Missing name or phone"),
        (status = 404, description = "Product not found")
    ),
    tag = "Consultations"
)]
pub async fn create_consultation(
    State(state): State<AppState>,
    Json(payload): Json<CreateConsultationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Consultation>>)> {
    let resp = consultation_service::create_consultation(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
