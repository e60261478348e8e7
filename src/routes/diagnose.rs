use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};

use crate::{
    dto::{
        diagnose::{DiagnoseForm, DiagnoseUnavailable},
        products::UploadedImage,
    },
    error::{AppError, AppResult},
    response::ApiResponse,
    services::diagnose_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/diagnose", post(diagnose))
}

async fn read_file(mut multipart: Multipart) -> AppResult<Option<UploadedImage>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        return Ok(Some(UploadedImage {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

#[utoipa::path(
    post,
    path = "/api/ml/diagnose",
    request_body(content = DiagnoseForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Detector result, or a `detected: false` payload when the detector is unavailable", body = ApiResponse<DiagnoseUnavailable>),
        (status = 400, description = "Missing file")
    ),
    tag = "Diagnose"
)]
pub async fn diagnose(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let image = read_file(multipart).await?;
    let resp = diagnose_service::diagnose(&state.config.detector, image).await?;
    Ok(Json(resp))
}
