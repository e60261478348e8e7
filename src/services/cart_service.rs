use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartLine, CartList, MAX_CART_QUANTITY, UpdateCartRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let items = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT ci.id, ci.product_id, ci.quantity,
               p.name, p.price, p.image_path, p.stock, ci.created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_email = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(&user.email)
    .fetch_all(&state.pool)
    .await?;

    let meta = Meta::all(items.len() as i64);
    Ok(ApiResponse::success("Cart", CartList { items }, Some(meta)))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    payload.validate()?;

    let product_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exists.is_none() {
        return Err(AppError::NotFound);
    }

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, user_email, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_email, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity,
                      updated_at = NOW()
        WHERE cart_items.quantity + EXCLUDED.quantity <= $5
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&user.email)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(MAX_CART_QUANTITY)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        AppError::bad_request(format!("A cart line cannot hold more than {MAX_CART_QUANTITY} items"))
    })?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", cart_item, Some(Meta::empty())))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    payload.validate()?;

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        UPDATE cart_items
        SET quantity = $3, updated_at = NOW()
        WHERE id = $1 AND user_email = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&user.email)
    .bind(payload.quantity)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Cart updated", cart_item, Some(Meta::empty())))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_email = $2")
        .bind(id)
        .bind(&user.email)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": id }),
    )
    .await;

    Ok(ApiResponse::message("Removed from cart"))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_email = $1")
        .bind(&user.email)
        .execute(&state.pool)
        .await?;

    tracing::debug!(email = %user.email, removed = result.rows_affected(), "cart cleared");
    Ok(ApiResponse::message("Cart cleared"))
}
