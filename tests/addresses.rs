mod common;

use autoparts_api::{
    dto::addresses::CreateAddressRequest,
    error::AppError,
    models::Role,
    services::address_service,
};

use common::{create_user, setup_state};

fn address(label: &str, is_default: bool) -> CreateAddressRequest {
    CreateAddressRequest {
        name: format!("Receiver {label}"),
        phone: "0987654321".into(),
        address: format!("{label} Hai Ba Trung"),
        is_default,
    }
}

#[tokio::test]
async fn exactly_one_default_address() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;

    let home = address_service::create_address(&state, &user, address("1", false))
        .await?
        .data
        .expect("address");
    assert!(home.is_default, "first address becomes the default");

    let office = address_service::create_address(&state, &user, address("2", false))
        .await?
        .data
        .expect("address");
    assert!(!office.is_default);

    let shop = address_service::create_address(&state, &user, address("3", true))
        .await?
        .data
        .expect("address");
    assert!(shop.is_default);

    let list = address_service::list_addresses(&state, &user).await?.data.expect("list");
    assert_eq!(list.len(), 3);
    assert_eq!(list.iter().filter(|a| a.is_default).count(), 1);
    assert_eq!(list[0].id, shop.id);

    address_service::set_default_address(&state, &user, office.id).await?;
    let list = address_service::list_addresses(&state, &user).await?.data.expect("list");
    let defaults: Vec<_> = list.iter().filter(|a| a.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, office.id);

    // Deleting the default promotes the newest remaining address.
    address_service::delete_address(&state, &user, office.id).await?;
    let list = address_service::list_addresses(&state, &user).await?.data.expect("list");
    assert_eq!(list.len(), 2);
    let defaults: Vec<_> = list.iter().filter(|a| a.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, shop.id);
    Ok(())
}

#[tokio::test]
async fn addresses_are_private_to_their_owner() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let owner = create_user(&state, Role::User).await?;
    let other = create_user(&state, Role::User).await?;

    let saved = address_service::create_address(&state, &owner, address("9", false))
        .await?
        .data
        .expect("address");

    let err = address_service::set_default_address(&state, &other, saved.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = address_service::delete_address(&state, &other, saved.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let theirs = address_service::list_addresses(&state, &other).await?.data.expect("list");
    assert!(theirs.is_empty());

    let err = address_service::create_address(&state, &owner, CreateAddressRequest {
        name: String::new(),
        ..address("10", false)
    })
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_keep_a_single_default() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;

    let mut tasks = Vec::new();
    for i in 0..4 {
        let (state, user) = (state.clone(), user.clone());
        tasks.push(tokio::spawn(async move {
            address_service::create_address(&state, &user, address(&format!("c{i}"), false)).await
        }));
    }
    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await?.map_err(|e| anyhow::anyhow!(e.to_string()))?.data.expect("address").id);
    }

    let list = address_service::list_addresses(&state, &user).await?.data.expect("list");
    assert_eq!(list.len(), 4);
    assert_eq!(list.iter().filter(|a| a.is_default).count(), 1);

    let mut tasks = Vec::new();
    for id in ids {
        let (state, user) = (state.clone(), user.clone());
        tasks.push(tokio::spawn(async move {
            address_service::set_default_address(&state, &user, id).await
        }));
    }
    for task in tasks {
        task.await?.map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    let defaults: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_addresses WHERE user_id = $1 AND is_default",
    )
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;
    assert_eq!(defaults, 1);
    Ok(())
}
