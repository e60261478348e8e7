use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::addresses::CreateAddressRequest,
    entity::{
        user_addresses::{ActiveModel, Column, Entity as Addresses},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Address,
    response::{ApiResponse, Meta},
    state::AppState,
};

async fn clear_default<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<()> {
    Addresses::update_many()
        .col_expr(Column::IsDefault, Expr::value(false))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

/// Serializes address-book writes per user. Every writer takes this lock before
/// reading or changing the default flag.
async fn lock_owner<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<()> {
    Users::find_by_id(user_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;
    Ok(())
}

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Vec<Address>>> {
    let addresses: Vec<Address> = Addresses::find()
        .filter(Column::UserId.eq(user.user_id))
        .order_by_desc(Column::IsDefault)
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Address::from)
        .collect();

    let meta = Meta::all(addresses.len() as i64);
    Ok(ApiResponse::success("Addresses", addresses, Some(meta)))
}

pub async fn create_address(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    payload.validate()?;
    let txn = state.orm.begin().await?;
    lock_owner(&txn, user.user_id).await?;

    let existing = Addresses::find()
        .filter(Column::UserId.eq(user.user_id))
        .count(&txn)
        .await?;
    // The first address is always the default.
    let is_default = payload.is_default || existing == 0;
    if is_default {
        clear_default(&txn, user.user_id).await?;
    }

    let address = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        name: Set(payload.name.trim().to_string()),
        phone: Set(payload.phone.trim().to_string()),
        address: Set(payload.address.trim().to_string()),
        is_default: Set(is_default),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "address_create",
        "user_addresses",
        serde_json::json!({ "address_id": address.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Address saved",
        Address::from(address),
        Some(Meta::empty()),
    ))
}

pub async fn set_default_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Address>> {
    let txn = state.orm.begin().await?;
    lock_owner(&txn, user.user_id).await?;

    let address = Addresses::find_by_id(id)
        .filter(Column::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    clear_default(&txn, user.user_id).await?;

    let mut active: ActiveModel = address.into();
    active.is_default = Set(true);
    let address = active.update(&txn).await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Default address updated",
        Address::from(address),
        Some(Meta::empty()),
    ))
}

pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    lock_owner(&txn, user.user_id).await?;

    let address = Addresses::find_by_id(id)
        .filter(Column::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    Addresses::delete_by_id(address.id).exec(&txn).await?;

    if address.is_default {
        let newest = Addresses::find()
            .filter(Column::UserId.eq(user.user_id))
            .order_by_desc(Column::CreatedAt)
            .one(&txn)
            .await?;
        if let Some(newest) = newest {
            let mut active: ActiveModel = newest.into();
            active.is_default = Set(true);
            active.update(&txn).await?;
        }
    }

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "address_delete",
        "user_addresses",
        serde_json::json!({ "address_id": id }),
    )
    .await;

    Ok(ApiResponse::message("Address deleted"))
}
