use crate::{
    dto::stats::{DailyOrders, Overview, TopProduct},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_staff},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const TOP_PRODUCTS: i64 = 5;
pub const TRAFFIC_DAYS: i32 = 30;

async fn scalar(state: &AppState, sql: &str) -> AppResult<i64> {
    let value: i64 = sqlx::query_scalar(sql).fetch_one(&state.pool).await?;
    Ok(value)
}

/// Best sellers by quantity over the last `days` days, cancelled orders excluded.
async fn top_products(state: &AppState, days: i32) -> AppResult<Vec<TopProduct>> {
    let rows = sqlx::query_as::<_, TopProduct>(
        r#"
        SELECT p.id AS product_id, p.name, p.part, SUM(oi.quantity)::BIGINT AS quantity
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        JOIN products p ON p.id = oi.product_id
        WHERE o.created_at >= NOW() - make_interval(days => $1)
          AND o.status <> 'cancelled'
        GROUP BY p.id, p.name, p.part
        ORDER BY quantity DESC, p.name
        LIMIT $2
        "#,
    )
    .bind(days)
    .bind(TOP_PRODUCTS)
    .fetch_all(&state.pool)
    .await?;
    Ok(rows)
}

pub async fn overview(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Overview>> {
    ensure_staff(user)?;

    let data = Overview {
        users: scalar(state, "SELECT COUNT(*) FROM users").await?,
        orders: scalar(state, "SELECT COUNT(*) FROM orders").await?,
        products: scalar(state, "SELECT COUNT(*) FROM products").await?,
        revenue: scalar(
            state,
            "SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders WHERE status <> 'cancelled'",
        )
        .await?,
        top_week: top_products(state, 7).await?,
        top_month: top_products(state, 30).await?,
    };

    Ok(ApiResponse::success("Overview", data, Some(Meta::empty())))
}

/// Orders per day over the last 30 days. Days without orders are omitted.
pub async fn traffic(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Vec<DailyOrders>>> {
    ensure_staff(user)?;

    let days = sqlx::query_as::<_, DailyOrders>(
        r#"
        SELECT to_char(created_at, 'YYYY-MM-DD') AS date, COUNT(*) AS count
        FROM orders
        WHERE created_at >= NOW() - make_interval(days => $1)
        GROUP BY date
        ORDER BY date
        "#,
    )
    .bind(TRAFFIC_DAYS)
    .fetch_all(&state.pool)
    .await?;

    let meta = Meta::all(days.len() as i64);
    Ok(ApiResponse::success("Traffic", days, Some(meta)))
}
