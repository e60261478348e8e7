use uuid::Uuid;

use crate::{
    audit,
    dto::products::{ProductDetail, ProductFacets, ProductForm, ProductList},
    entity::products::{ActiveModel, Column, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_staff},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::uploads::save_image,
    state::AppState,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::ActiveValue::NotSet;
use serde_json::Value;

/// Validated product fields parsed from a [`ProductForm`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub part: String,
    pub brand: String,
    pub price: i64,
    pub stock: i32,
    pub description: String,
    pub specifications: Value,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn required(value: Option<&String>, field: &str) -> AppResult<String> {
    non_empty(value)
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

pub fn parse_price(raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(price) if price >= 0 => Ok(price),
        _ => Err(AppError::bad_request("price must be a non-negative integer")),
    }
}

pub fn parse_stock(raw: &str) -> AppResult<i32> {
    match raw.trim().parse::<i32>() {
        Ok(stock) if stock >= 0 => Ok(stock),
        _ => Err(AppError::bad_request("stock must be a non-negative integer")),
    }
}

pub fn parse_specifications(raw: &str) -> AppResult<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        _ => Err(AppError::bad_request("specifications must be a JSON object")),
    }
}

/// Fields for a new product: name, part, brand and price are mandatory.
pub fn fields_for_create(form: &ProductForm) -> AppResult<ProductFields> {
    Ok(ProductFields {
        name: required(form.name.as_ref(), "name")?,
        part: required(form.part.as_ref(), "part")?,
        brand: required(form.brand.as_ref(), "brand")?,
        price: parse_price(&required(form.price.as_ref(), "price")?)?,
        stock: non_empty(form.stock.as_ref()).map(parse_stock).transpose()?.unwrap_or(0),
        description: form.description.clone().unwrap_or_default(),
        specifications: form
            .specifications
            .as_deref()
            .map(parse_specifications)
            .transpose()?
            .unwrap_or_else(|| Value::Object(Default::default())),
    })
}

/// `%term%` for ILIKE with the term's own wildcards escaped (backslash is the
/// Postgres default escape character).
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern.clone()))
                .add(Expr::col(Column::Brand).ilike(pattern)),
        );
    }
    if let Some(part) = non_empty(query.part.as_ref()) {
        condition = condition.add(Column::Part.eq(part));
    }
    if let Some(brand) = non_empty(query.brand.as_ref()) {
        condition = condition.add(Column::Brand.eq(brand));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }
    if query.in_stock == Some(true) {
        condition = condition.add(Column::Stock.gt(0));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::Stock,
    };

    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col).order_by_asc(Column::Id),
        SortOrder::Desc => finder.order_by_desc(sort_col).order_by_desc(Column::Id),
    };

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
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn product_facets(state: &AppState) -> AppResult<ApiResponse<ProductFacets>> {
    let parts: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT part FROM products WHERE part <> '' ORDER BY part")
            .fetch_all(&state.pool)
            .await?;
    let brands: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT brand FROM products WHERE brand <> '' ORDER BY brand")
            .fetch_all(&state.pool)
            .await?;
    Ok(ApiResponse::success(
        "Facets",
        ProductFacets { parts, brands },
        Some(Meta::empty()),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Product::from)
        .ok_or(AppError::NotFound)?;

    let (review_count, average_rating): (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(rating)::FLOAT8 FROM reviews WHERE product_id = $1",
    )
    .bind(id)
    .fetch_one(&state.pool)
    .await?;

    let data = ProductDetail {
        product,
        review_count,
        average_rating,
    };
    Ok(ApiResponse::success("Product", data, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    mut form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_staff(user)?;
    let fields = fields_for_create(&form)?;

    let image_path = match form.image.take() {
        Some(image) => save_image(&state.config.upload_dir, image).await?,
        None => form.image_path.clone().unwrap_or_default(),
    };

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(fields.name),
        part: Set(fields.part),
        brand: Set(fields.brand),
        price: Set(fields.price),
        stock: Set(fields.stock),
        image_path: Set(image_path),
        description: Set(fields.description),
        specifications: Set(fields.specifications),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    mut form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_staff(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = non_empty(form.name.as_ref()) {
        active.name = Set(name.to_string());
    }
    if let Some(part) = non_empty(form.part.as_ref()) {
        active.part = Set(part.to_string());
    }
    if let Some(brand) = non_empty(form.brand.as_ref()) {
        active.brand = Set(brand.to_string());
    }
    if let Some(price) = non_empty(form.price.as_ref()) {
        active.price = Set(parse_price(price)?);
    }
    if let Some(stock) = non_empty(form.stock.as_ref()) {
        active.stock = Set(parse_stock(stock)?);
    }
    if let Some(description) = form.description.take() {
        active.description = Set(description);
    }
    if let Some(specifications) = form.specifications.as_deref() {
        active.specifications = Set(parse_specifications(specifications)?);
    }
    if let Some(image) = form.image.take() {
        active.image_path = Set(save_image(&state.config.upload_dir, image).await?);
    } else if let Some(image_path) = form.image_path.take() {
        active.image_path = Set(image_path);
    }

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_staff(user)?;
    let result = Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::Conflict("Product is referenced by existing orders".to_string())
            }
            _ => AppError::OrmError(err),
        })?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::message("Deleted"))
}
