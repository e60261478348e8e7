#![allow(dead_code)]

use autoparts_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    models::Role,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Connects to the test database and applies migrations. Returns `None` (and the
/// caller skips) when no database is configured.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let mut config = AppConfig::with_database_url(database_url, "integration-test-secret");
    config.upload_dir = std::env::temp_dir().join(format!("autoparts-test-uploads-{}", Uuid::new_v4()));
    Ok(Some(AppState::new(pool, config)))
}

/// Inserts a user with a unique email. Tests never truncate, so they can run in parallel.
pub async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let email = format!("{}-{}@example.com", role.as_str(), Uuid::new_v4().simple());
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test {}", role)),
        email: Set(email),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        name: user.name,
        role,
    })
}

pub async fn create_product(state: &AppState, price: i64, stock: i32) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test part {}", Uuid::new_v4().simple())),
        part: Set("brakes".into()),
        brand: Set("TestBrand".into()),
        price: Set(price),
        stock: Set(stock),
        image_path: Set(String::new()),
        description: Set("Part used by integration tests".into()),
        specifications: Set(serde_json::json!({})),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let stock: i32 = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(stock)
}
