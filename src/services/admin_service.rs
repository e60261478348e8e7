use chrono::Utc;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::{
        admin::{CreateImportRequest, ImportLogEntry, LowStockQuery, UpdateUserRoleRequest},
        consultations::{AdminConsultation, UpdateConsultationStatusRequest},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::ProductList,
        reviews::AdminReview,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        consultations::{ActiveModel as ConsultationActive, Entity as Consultations},
        import_logs::ActiveModel as ImportActive,
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        reviews::Entity as Reviews,
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_staff},
    models::{Consultation, ConsultationStatus, ImportLog, Order, OrderStatus, Product, Role, User},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::order_service::{load_lines, parse_status_filter, with_items},
    state::AppState,
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

async fn count(state: &AppState, sql: &str) -> AppResult<i64> {
    let total: (i64,) = sqlx::query_as(sql).fetch_one(&state.pool).await?;
    Ok(total.0)
}

// --- users (admin only) ---

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<Vec<User>>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    let total = count(state, "SELECT COUNT(*) FROM users").await?;

    Ok(ApiResponse::success("Users", users, Some(Meta::new(page, limit, total))))
}

pub async fn update_user_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRoleRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let role = payload
        .role
        .trim()
        .parse::<Role>()
        .map_err(AppError::BadRequest)?;

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = existing.into();
    active.role = Set(role.as_str().to_string());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_role_update",
        "users",
        serde_json::json!({ "user_id": id, "role": role.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Role updated",
        User::from(updated),
        Some(Meta::empty()),
    ))
}

/// Deletes a user with their orders and cart. Addresses and reviews cascade.
pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if id == user.user_id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }

    let txn = state.orm.begin().await?;

    let target = Users::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let order_ids: Vec<Uuid> = Orders::find()
        .select_only()
        .column(OrderCol::Id)
        .filter(OrderCol::UserId.eq(id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !order_ids.is_empty() {
        OrderItems::delete_many()
            .filter(OrderItemCol::OrderId.is_in(order_ids.clone()))
            .exec(&txn)
            .await?;
        Orders::delete_many()
            .filter(OrderCol::Id.is_in(order_ids.clone()))
            .exec(&txn)
            .await?;
    }
    CartItems::delete_many()
        .filter(CartCol::UserEmail.eq(target.email.clone()))
        .exec(&txn)
        .await?;
    Users::delete_many()
        .filter(UserCol::Id.eq(id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(user_id = %id, orders = order_ids.len(), "user deleted");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_delete",
        "users",
        serde_json::json!({ "user_id": id, "email": target.email }),
    )
    .await;

    Ok(ApiResponse::message("User deleted"))
}

// --- orders (staff) ---

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_staff(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = parse_status_filter(query.status.as_ref())? {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders: Vec<Order> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let items = with_items(&state.pool, orders).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_staff(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Order::from)
        .ok_or(AppError::NotFound)?;

    let items = load_lines(&state.pool, &[order.id]).await?;
    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_staff(user)?;
    let next = payload
        .status
        .trim()
        .parse::<OrderStatus>()
        .map_err(AppError::BadRequest)?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let current = existing
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if !current.can_transition_to(next) {
        return Err(AppError::bad_request(format!(
            "Cannot change order status from {current} to {next}"
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current.as_str(), "to": next.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

// --- reviews (staff) ---

pub async fn list_reviews(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<Vec<AdminReview>>> {
    ensure_staff(user)?;
    let (page, limit, offset) = pagination.normalize();

    let reviews = sqlx::query_as::<_, AdminReview>(
        r#"
        SELECT r.id, r.product_id, p.name AS product_name, p.image_path AS product_image,
               r.user_id, r.user_name, r.rating, r.comment, r.created_at
        FROM reviews r
        JOIN products p ON p.id = r.product_id
        ORDER BY r.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    let total = count(state, "SELECT COUNT(*) FROM reviews").await?;

    Ok(ApiResponse::success("Reviews", reviews, Some(Meta::new(page, limit, total))))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_staff(user)?;
    let result = Reviews::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "review_delete",
        "reviews",
        serde_json::json!({ "review_id": id }),
    )
    .await;

    Ok(ApiResponse::message("Review deleted"))
}

// --- consultations (staff) ---

pub async fn list_consultations(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<Vec<AdminConsultation>>> {
    ensure_staff(user)?;
    let (page, limit, offset) = pagination.normalize();

    let consultations = sqlx::query_as::<_, AdminConsultation>(
        r#"
        SELECT c.id, c.product_id, p.name AS product_name, p.image_path,
               c.name, c.phone, c.content, c.status, c.created_at
        FROM consultations c
        LEFT JOIN products p ON p.id = c.product_id
        ORDER BY c.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    let total = count(state, "SELECT COUNT(*) FROM consultations").await?;

    Ok(ApiResponse::success(
        "Consultations",
        consultations,
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn update_consultation_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateConsultationStatusRequest,
) -> AppResult<ApiResponse<Consultation>> {
    ensure_staff(user)?;
    let status = payload
        .status
        .trim()
        .parse::<ConsultationStatus>()
        .map_err(AppError::BadRequest)?;

    let existing = Consultations::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ConsultationActive = existing.into();
    active.status = Set(status.as_str().to_string());
    let consultation = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Consultation updated",
        Consultation::from(consultation),
        Some(Meta::empty()),
    ))
}

// --- stock imports and inventory (staff) ---

pub async fn list_imports(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<Vec<ImportLogEntry>>> {
    ensure_staff(user)?;
    let (page, limit, offset) = pagination.normalize();

    let imports = sqlx::query_as::<_, ImportLogEntry>(
        r#"
        SELECT il.id, il.product_id, p.name AS product_name, il.quantity,
               il.supplier, il.note, il.created_at
        FROM import_logs il
        JOIN products p ON p.id = il.product_id
        ORDER BY il.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    let total = count(state, "SELECT COUNT(*) FROM import_logs").await?;

    Ok(ApiResponse::success("Imports", imports, Some(Meta::new(page, limit, total))))
}

/// Records a stock import and adds its quantity to the product, atomically.
pub async fn create_import(
    state: &AppState,
    user: &AuthUser,
    payload: CreateImportRequest,
) -> AppResult<ApiResponse<ImportLog>> {
    ensure_staff(user)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(payload.product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if product.stock.checked_add(payload.quantity).is_none() {
        return Err(AppError::bad_request(format!(
            "Importing {} would exceed the stock limit for {}",
            payload.quantity, product.name
        )));
    }

    let log = ImportActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        quantity: Set(payload.quantity),
        supplier: Set(payload.supplier.trim().to_string()),
        note: Set(payload.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(payload.quantity))
        .filter(ProdCol::Id.eq(product.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        product_id = %product.id,
        quantity = payload.quantity,
        stock_before = product.stock,
        "stock imported"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "stock_import",
        "import_logs",
        serde_json::json!({ "import_id": log.id, "product_id": product.id, "quantity": log.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Stock imported",
        ImportLog::from(log),
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_staff(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock products", ProductList { items }, Some(meta)))
}
