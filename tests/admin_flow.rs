mod common;

use autoparts_api::{
    dto::{
        addresses::CreateAddressRequest,
        admin::UpdateUserRoleRequest,
        cart::AddToCartRequest,
        orders::{CheckoutItem, CheckoutRequest, DeliveryInfo, InstallationChoice},
        reviews::CreateReviewRequest,
    },
    error::AppError,
    middleware::auth::{AuthUser, MaybeAuthUser},
    models::Role,
    services::{
        address_service, admin_service, cart_service, order_service, product_service,
        review_service,
    },
    state::AppState,
};
use uuid::Uuid;

use common::{create_product, create_user, setup_state, stock_of};

fn order_for(product_id: Uuid, quantity: i32) -> CheckoutRequest {
    CheckoutRequest {
        items: vec![CheckoutItem {
            product_id,
            quantity,
        }],
        info: Some(DeliveryInfo {
            name: "Pham Thi B".into(),
            phone: "0933333333".into(),
            address: "7 Tran Hung Dao".into(),
        }),
        method: None,
        installation: Some(InstallationChoice {
            method: "self".into(),
            time: None,
        }),
    }
}

async fn count(state: &AppState, sql: &str, id: Uuid) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar(sql).bind(id).fetch_one(&state.pool).await?;
    Ok(n)
}

async fn count_by_email(state: &AppState, email: &str) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_email = $1")
        .bind(email)
        .fetch_one(&state.pool)
        .await?;
    Ok(n)
}

/// A customer with one order, one cart line, one address and one review.
async fn busy_customer(state: &AppState) -> anyhow::Result<(AuthUser, Uuid)> {
    let buyer = create_user(state, Role::User).await?;
    let product = create_product(state, 20_000, 10).await?;

    order_service::place_order(state, MaybeAuthUser(Some(buyer.clone())), order_for(product, 1))
        .await?;
    cart_service::add_to_cart(
        state,
        &buyer,
        AddToCartRequest {
            product_id: product,
            quantity: 2,
        },
    )
    .await?;
    address_service::create_address(
        state,
        &buyer,
        CreateAddressRequest {
            name: "Pham Thi B".into(),
            phone: "0933333333".into(),
            address: "7 Tran Hung Dao".into(),
            is_default: false,
        },
    )
    .await?;
    review_service::create_review(
        state,
        &buyer,
        CreateReviewRequest {
            product_id: product,
            rating: 4,
            comment: "Fits well".into(),
        },
    )
    .await?;
    Ok((buyer, product))
}

#[tokio::test]
async fn deleting_a_user_removes_their_data() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let (buyer, _) = busy_customer(&state).await?;

    let order_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE user_id = $1")
        .bind(buyer.user_id)
        .fetch_all(&state.pool)
        .await?;
    assert_eq!(order_ids.len(), 1);

    admin_service::delete_user(&state, &admin, buyer.user_id).await?;

    assert_eq!(count(&state, "SELECT COUNT(*) FROM users WHERE id = $1", buyer.user_id).await?, 0);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM orders WHERE id = $1", order_ids[0]).await?, 0);
    assert_eq!(
        count(&state, "SELECT COUNT(*) FROM order_items WHERE order_id = $1", order_ids[0]).await?,
        0
    );
    assert_eq!(
        count(&state, "SELECT COUNT(*) FROM user_addresses WHERE user_id = $1", buyer.user_id)
            .await?,
        0
    );
    assert_eq!(
        count(&state, "SELECT COUNT(*) FROM reviews WHERE user_id = $1", buyer.user_id).await?,
        0
    );
    assert_eq!(count_by_email(&state, &buyer.email).await?, 0);

    let err = admin_service::delete_user(&state, &admin, buyer.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn user_deletion_is_admin_only_and_never_self() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let staff = create_user(&state, Role::Staff).await?;
    let customer = create_user(&state, Role::User).await?;

    let err = admin_service::delete_user(&state, &admin, admin.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = admin_service::delete_user(&state, &staff, customer.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    assert_eq!(
        count(&state, "SELECT COUNT(*) FROM users WHERE id = $1", admin.user_id).await?,
        1
    );
    Ok(())
}

#[tokio::test]
async fn stale_token_checks_out_as_guest() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let buyer = create_user(&state, Role::User).await?;
    let product = create_product(&state, 15_000, 4).await?;

    admin_service::delete_user(&state, &admin, buyer.user_id).await?;

    let placed = order_service::place_order(&state, MaybeAuthUser(Some(buyer)), order_for(product, 2))
        .await?
        .data
        .expect("order");
    assert_eq!(placed.order.user_id, None);
    assert_eq!(placed.order.total, 30_000);
    assert_eq!(stock_of(&state, product).await?, 2);
    Ok(())
}

#[tokio::test]
async fn role_updates_are_validated() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let staff = create_user(&state, Role::Staff).await?;
    let customer = create_user(&state, Role::User).await?;

    let err = admin_service::update_user_role(
        &state,
        &admin,
        customer.user_id,
        UpdateUserRoleRequest {
            role: "superuser".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = admin_service::update_user_role(
        &state,
        &staff,
        customer.user_id,
        UpdateUserRoleRequest {
            role: "admin".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let updated = admin_service::update_user_role(
        &state,
        &admin,
        customer.user_id,
        UpdateUserRoleRequest {
            role: " staff ".into(),
        },
    )
    .await?
    .data
    .expect("user");
    assert_eq!(updated.role, "staff");
    Ok(())
}

#[tokio::test]
async fn ordered_products_cannot_be_deleted() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let staff = create_user(&state, Role::Staff).await?;
    let ordered = create_product(&state, 5_000, 3).await?;
    let unsold = create_product(&state, 5_000, 3).await?;

    order_service::place_order(&state, MaybeAuthUser(None), order_for(ordered, 1)).await?;

    let err = product_service::delete_product(&state, &staff, ordered)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(stock_of(&state, ordered).await?, 2);

    product_service::delete_product(&state, &staff, unsold).await?;
    let err = product_service::delete_product(&state, &staff, unsold)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}
