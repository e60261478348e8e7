use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::orders::{CheckoutItem, CheckoutRequest, DeliveryInfo, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, MaybeAuthUser},
    models::{InstallationMethod, Order, OrderLine, OrderStatus, PaymentMethod},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// The product fields checkout needs, read under a row lock.
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub image_path: String,
    pub price: i64,
    pub stock: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuote {
    pub lines: Vec<PricedLine>,
    pub subtotal: i64,
    pub installation_fee: i64,
    pub total: i64,
}

/// A checkout request that passed validation.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub lines: Vec<CheckoutItem>,
    pub contact: DeliveryInfo,
    pub installation: InstallationMethod,
    pub payment: PaymentMethod,
}

/// Merges repeated products into one line, keeping first-seen order.
pub fn merge_lines(items: &[CheckoutItem]) -> AppResult<Vec<CheckoutItem>> {
    let mut merged: Vec<CheckoutItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::bad_request("quantity must be at least 1"));
        }
        match merged.iter_mut().find(|line| line.product_id == item.product_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| AppError::bad_request("quantity is too large"))?;
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

pub fn validate_checkout(payload: CheckoutRequest) -> AppResult<CheckoutPlan> {
    if payload.items.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }

    let installation = payload
        .installation
        .as_ref()
        .map(|choice| choice.method.trim())
        .filter(|method| !method.is_empty())
        .ok_or_else(|| AppError::bad_request("installation method is required"))?
        .parse::<InstallationMethod>()
        .map_err(AppError::BadRequest)?;

    let contact = payload
        .info
        .filter(|info| {
            !info.name.trim().is_empty()
                && !info.phone.trim().is_empty()
                && !info.address.trim().is_empty()
        })
        .ok_or_else(|| AppError::bad_request("delivery name, phone and address are required"))?;

    let payment = match payload.method.as_deref().map(str::trim) {
        None | Some("") => PaymentMethod::Cod,
        Some(method) => method.parse::<PaymentMethod>().map_err(AppError::BadRequest)?,
    };

    let lines = merge_lines(&payload.items)?;

    let mut contact = DeliveryInfo {
        name: contact.name.trim().to_string(),
        phone: contact.phone.trim().to_string(),
        address: contact.address.trim().to_string(),
    };
    if installation == InstallationMethod::Home {
        if let Some(time) = payload
            .installation
            .as_ref()
            .and_then(|choice| choice.time.as_deref())
            .map(str::trim)
            .filter(|time| !time.is_empty())
        {
            contact.address = format!("{} (installation at: {})", contact.address, time);
        }
    }

    Ok(CheckoutPlan {
        lines,
        contact,
        installation,
        payment,
    })
}

pub fn installation_fee(method: InstallationMethod, home_fee: i64) -> i64 {
    match method {
        InstallationMethod::Home => home_fee,
        InstallationMethod::SelfService => 0,
    }
}

/// Prices merged lines against locked product rows and checks stock.
pub fn price_order(
    lines: &[CheckoutItem],
    products: &HashMap<Uuid, ProductSnapshot>,
    installation_fee: i64,
) -> AppResult<OrderQuote> {
    let mut subtotal: i64 = 0;
    let mut priced = Vec::with_capacity(lines.len());

    for line in lines {
        let product = products.get(&line.product_id).ok_or_else(|| {
            AppError::bad_request(format!("Product {} does not exist", line.product_id))
        })?;
        if product.stock < line.quantity {
            return Err(AppError::bad_request(format!(
                "Insufficient stock for {} ({} left)",
                product.name, product.stock
            )));
        }
        let amount = product
            .price
            .checked_mul(line.quantity as i64)
            .and_then(|amount| subtotal.checked_add(amount))
            .ok_or_else(|| AppError::bad_request("order total is too large"))?;
        subtotal = amount;
        priced.push(PricedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    Ok(OrderQuote {
        lines: priced,
        subtotal,
        installation_fee,
        total: subtotal + installation_fee,
    })
}

/// Loads the item lines of the given orders, joined with their products.
pub async fn load_lines(pool: &DbPool, order_ids: &[Uuid]) -> AppResult<Vec<OrderLine>> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    let lines = sqlx::query_as::<_, OrderLine>(
        r#"
        SELECT oi.order_id, oi.product_id, p.name AS product_name, p.image_path,
               oi.quantity, oi.price
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.order_id, p.name
        "#,
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await?;
    Ok(lines)
}

/// Pairs each order with its item lines, preserving the order of `orders`.
pub async fn with_items(pool: &DbPool, orders: Vec<Order>) -> AppResult<Vec<OrderWithItems>> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for line in load_lines(pool, &ids).await? {
        grouped.entry(line.order_id).or_default().push(line);
    }
    Ok(orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}

pub async fn place_order(
    state: &AppState,
    buyer: MaybeAuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let plan = validate_checkout(payload)?;
    let product_ids: Vec<Uuid> = plan.lines.iter().map(|l| l.product_id).collect();

    let txn = state.orm.begin().await?;

    // A token can outlive its account; such a buyer checks out as a guest.
    let buyer = match buyer.0 {
        Some(user) => {
            let exists = Users::find_by_id(user.user_id)
                .lock_shared()
                .one(&txn)
                .await?
                .is_some();
            if !exists {
                tracing::warn!(user_id = %user.user_id, "token user not found, placing guest order");
            }
            exists.then_some(user)
        }
        None => None,
    };

    let products: HashMap<Uuid, ProductSnapshot> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids.clone()))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| {
            (
                p.id,
                ProductSnapshot {
                    id: p.id,
                    name: p.name,
                    image_path: p.image_path,
                    price: p.price,
                    stock: p.stock,
                },
            )
        })
        .collect();

    let fee = installation_fee(plan.installation, state.config.installation_fee);
    let quote = price_order(&plan.lines, &products, fee)?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(buyer.as_ref().map(|u| u.user_id)),
        total: Set(quote.total),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        customer_name: Set(plan.contact.name),
        customer_phone: Set(plan.contact.phone),
        customer_address: Set(plan.contact.address),
        payment_method: Set(plan.payment.as_str().to_string()),
        installation_method: Set(plan.installation.as_str().to_string()),
        installation_fee: Set(quote.installation_fee),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(quote.lines.len());
    for line in &quote.lines {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
        }
        .insert(&txn)
        .await?;

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(line.product_id))
            .exec(&txn)
            .await?;

        let (product_name, image_path) = products
            .get(&line.product_id)
            .map(|p| (p.name.clone(), p.image_path.clone()))
            .unwrap_or_default();
        items.push(OrderLine {
            order_id: order.id,
            product_id: line.product_id,
            product_name,
            image_path,
            quantity: line.quantity,
            price: line.unit_price,
        });
    }

    if let Some(user) = &buyer {
        CartItems::delete_many()
            .filter(CartCol::UserEmail.eq(user.email.clone()))
            .filter(CartCol::ProductId.is_in(product_ids))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        total = order.total,
        guest = buyer.is_none(),
        "order placed"
    );
    audit::record(
        &state.orm,
        buyer.as_ref().map(|u| u.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub fn parse_status_filter(status: Option<&String>) -> AppResult<Option<OrderStatus>> {
    status
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<OrderStatus>().map_err(AppError::BadRequest))
        .transpose()
}

pub async fn my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
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

pub async fn get_my_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .map(Order::from)
        .ok_or(AppError::NotFound)?;

    let items = load_lines(&state.pool, &[order.id]).await?;
    Ok(ApiResponse::success(
        "Order",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// The buyer confirms delivery: `shipping` becomes `completed`.
pub async fn confirm_received(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let current = order
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if current != OrderStatus::Shipping {
        return Err(AppError::bad_request(format!(
            "Only orders that are shipping can be marked as received (current status: {current})"
        )));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Completed.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_received",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order received",
        Order::from(order),
        Some(Meta::empty()),
    ))
}
