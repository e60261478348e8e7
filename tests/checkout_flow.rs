mod common;

use autoparts_api::{
    dto::{
        admin::{CreateImportRequest, LowStockQuery},
        cart::AddToCartRequest,
        orders::{CheckoutItem, CheckoutRequest, DeliveryInfo, InstallationChoice, UpdateOrderStatusRequest},
    },
    error::AppError,
    middleware::auth::MaybeAuthUser,
    models::Role,
    routes::params::OrderListQuery,
    services::{admin_service, cart_service, order_service},
};
use uuid::Uuid;

use common::{create_product, create_user, setup_state, stock_of};

fn request(items: Vec<(Uuid, i32)>, method: &str, time: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        items: items
            .into_iter()
            .map(|(product_id, quantity)| CheckoutItem {
                product_id,
                quantity,
            })
            .collect(),
        info: Some(DeliveryInfo {
            name: "Tran Van A".into(),
            phone: "0912345678".into(),
            address: "45 Le Loi, District 1".into(),
        }),
        method: Some("cod".into()),
        installation: Some(InstallationChoice {
            method: method.into(),
            time: time.map(String::from),
        }),
    }
}

fn status(value: &str) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status: value.into(),
    }
}

#[tokio::test]
async fn guest_checkout_with_home_installation() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let first = create_product(&state, 200_000, 10).await?;
    let second = create_product(&state, 50_000, 3).await?;

    let response = order_service::place_order(
        &state,
        MaybeAuthUser(None),
        request(vec![(first, 2), (second, 3)], "home", Some("Sunday 10:00")),
    )
    .await?;
    let placed = response.data.expect("order");

    assert_eq!(placed.order.user_id, None);
    assert_eq!(placed.order.status, "pending");
    assert_eq!(placed.order.installation_fee, state.config.installation_fee);
    assert_eq!(placed.order.total, 550_000 + state.config.installation_fee);
    assert!(placed.order.customer_address.ends_with("(installation at: Sunday 10:00)"));
    assert_eq!(placed.items.len(), 2);

    assert_eq!(stock_of(&state, first).await?, 8);
    assert_eq!(stock_of(&state, second).await?, 0);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rolls_back_every_line() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let plenty = create_product(&state, 10_000, 50).await?;
    let scarce = create_product(&state, 10_000, 1).await?;

    let err = order_service::place_order(
        &state,
        MaybeAuthUser(None),
        request(vec![(plenty, 5), (scarce, 2)], "self", None),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("Insufficient stock")));

    assert_eq!(stock_of(&state, plenty).await?, 50);
    assert_eq!(stock_of(&state, scarce).await?, 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_lines_are_merged() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, 1_000, 10).await?;

    let placed = order_service::place_order(
        &state,
        MaybeAuthUser(None),
        request(vec![(product, 1), (product, 2)], "self", None),
    )
    .await?
    .data
    .expect("order");

    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 3);
    assert_eq!(placed.order.total, 3_000);
    assert_eq!(stock_of(&state, product).await?, 7);
    Ok(())
}

#[tokio::test]
async fn signed_in_checkout_clears_purchased_cart_lines() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let buyer = create_user(&state, Role::User).await?;
    let bought = create_product(&state, 30_000, 10).await?;
    let kept = create_product(&state, 40_000, 10).await?;

    for (product_id, quantity) in [(bought, 1), (bought, 1), (kept, 1)] {
        cart_service::add_to_cart(
            &state,
            &buyer,
            AddToCartRequest {
                product_id,
                quantity,
            },
        )
        .await?;
    }
    let cart = cart_service::list_cart(&state, &buyer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 2);

    let placed = order_service::place_order(
        &state,
        MaybeAuthUser(Some(buyer.clone())),
        request(vec![(bought, 2)], "self", None),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(placed.order.user_id, Some(buyer.user_id));

    let cart = cart_service::list_cart(&state, &buyer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, kept);

    let mine = order_service::my_orders(&state, &buyer, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert_eq!(mine.items.len(), 1);
    assert_eq!(mine.items[0].items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn status_machine_and_receive_flow() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let buyer = create_user(&state, Role::User).await?;
    let staff = create_user(&state, Role::Staff).await?;
    let product = create_product(&state, 75_000, 5).await?;

    let order_id = order_service::place_order(
        &state,
        MaybeAuthUser(Some(buyer.clone())),
        request(vec![(product, 1)], "self", None),
    )
    .await?
    .data
    .expect("order")
    .order
    .id;

    // A buyer cannot move order state through the back office.
    let err = admin_service::update_order_status(&state, &buyer, order_id, status("shipping"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Not shipped yet.
    let err = order_service::confirm_received(&state, &buyer, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = admin_service::update_order_status(&state, &staff, order_id, status("completed"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let shipped = admin_service::update_order_status(&state, &staff, order_id, status("shipping"))
        .await?
        .data
        .expect("order");
    assert_eq!(shipped.status, "shipping");

    let received = order_service::confirm_received(&state, &buyer, order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(received.status, "completed");

    let err = admin_service::update_order_status(&state, &staff, order_id, status("cancelled"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Another customer cannot see or receive this order.
    let stranger = create_user(&state, Role::User).await?;
    let err = order_service::get_my_order(&state, &stranger, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn imports_restock_and_low_stock_listing() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let staff = create_user(&state, Role::Staff).await?;
    let product = create_product(&state, 10_000, 0).await?;

    let low = admin_service::list_low_stock(&state, &staff, LowStockQuery {
        per_page: Some(100),
        threshold: Some(0),
        ..Default::default()
    })
    .await?
    .data
    .expect("products");
    assert!(low.items.iter().any(|p| p.id == product));

    let log = admin_service::create_import(&state, &staff, CreateImportRequest {
        product_id: product,
        quantity: 12,
        supplier: "  Bosch VN  ".into(),
        note: Some("   ".into()),
    })
    .await?
    .data
    .expect("import");
    assert_eq!(log.supplier, "Bosch VN");
    assert_eq!(log.note, None);
    assert_eq!(stock_of(&state, product).await?, 12);

    let err = admin_service::create_import(&state, &staff, CreateImportRequest {
        product_id: product,
        quantity: 0,
        supplier: String::new(),
        note: None,
    })
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = admin_service::create_import(&state, &staff, CreateImportRequest {
        product_id: Uuid::new_v4(),
        quantity: 1,
        supplier: String::new(),
        note: None,
    })
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn cart_and_import_quantities_are_bounded() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let buyer = create_user(&state, Role::User).await?;
    let staff = create_user(&state, Role::Staff).await?;
    let product = create_product(&state, 1_000, 5).await?;

    let add = |quantity| AddToCartRequest {
        product_id: product,
        quantity,
    };
    let err = cart_service::add_to_cart(&state, &buyer, add(1_000)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    cart_service::add_to_cart(&state, &buyer, add(999)).await?;
    let err = cart_service::add_to_cart(&state, &buyer, add(1)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    let cart = cart_service::list_cart(&state, &buyer).await?.data.expect("cart");
    assert_eq!(cart.items[0].quantity, 999);

    let nearly_full = create_product(&state, 1_000, i32::MAX - 5).await?;
    let err = admin_service::create_import(&state, &staff, CreateImportRequest {
        product_id: nearly_full,
        quantity: 10,
        supplier: String::new(),
        note: None,
    })
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, nearly_full).await?, i32::MAX - 5);

    let err = admin_service::create_import(&state, &staff, CreateImportRequest {
        product_id: product,
        quantity: 1_000_001,
        supplier: String::new(),
        note: None,
    })
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}
