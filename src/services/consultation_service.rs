use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::consultations::CreateConsultationRequest,
    entity::{consultations::ActiveModel, products::Entity as Products},
    error::{AppError, AppResult},
    models::{Consultation, ConsultationStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_consultation(
    state: &AppState,
    payload: CreateConsultationRequest,
) -> AppResult<ApiResponse<Consultation>> {
    payload.validate()?;

    if let Some(product_id) = payload.product_id {
        if Products::find_by_id(product_id).one(&state.orm).await?.is_none() {
            return Err(AppError::NotFound);
        }
    }

    let content = payload
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let consultation = ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(payload.product_id),
        name: Set(payload.name.trim().to_string()),
        phone: Set(payload.phone.trim().to_string()),
        content: Set(content),
        status: Set(ConsultationStatus::Pending.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(consultation_id = %consultation.id, "consultation requested");

    Ok(ApiResponse::success(
        "Consultation request received",
        Consultation::from(consultation),
        Some(Meta::empty()),
    ))
}
