use autoparts_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    models::Role,
    services::auth_service::hash_password,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "Admin", "admin@autoparts.local", "Admin@123", Role::Admin).await?;
    let staff_id = ensure_user(&pool, "Staff", "staff@autoparts.local", "Staff@123", Role::Staff).await?;
    let customer_id =
        ensure_user(&pool, "Customer", "customer@autoparts.local", "Customer@123", Role::User).await?;
    let inserted = seed_products(&pool).await?;

    println!(
        "Seed completed. Admin: {admin_id}, Staff: {staff_id}, Customer: {customer_id}, new products: {inserted}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<u64> {
    let products = vec![
        (
            "Front brake pads (ceramic)",
            "brakes",
            "Brembo",
            850_000_i64,
            40,
            "Low-dust ceramic pads for most compact sedans.",
            json!({ "position": "front", "material": "ceramic" }),
        ),
        (
            "Oil filter",
            "engine",
            "Bosch",
            120_000,
            150,
            "Spin-on oil filter, replace every 5,000 km.",
            json!({ "thread": "3/4-16 UNF" }),
        ),
        (
            "Iridium spark plug",
            "engine",
            "NGK",
            180_000,
            200,
            "Long-life iridium tip.",
            json!({ "gap_mm": 1.1 }),
        ),
        (
            "Wiper blade 24\"",
            "exterior",
            "Denso",
            150_000,
            80,
            "Frameless all-season wiper blade.",
            json!({ "length_in": 24 }),
        ),
        (
            "LED headlight bulb H4",
            "lighting",
            "Philips",
            650_000,
            3,
            "6000K LED conversion bulb pair.",
            json!({ "socket": "H4", "color_temp_k": 6000 }),
        ),
        (
            "12V battery 60Ah",
            "electrical",
            "GS",
            1_750_000,
            12,
            "Maintenance-free lead-acid battery.",
            json!({ "capacity_ah": 60, "cca": 540 }),
        ),
        (
            "Dash camera 2K",
            "interior",
            "70mai",
            1_290_000,
            25,
            "Front dash camera with night vision.",
            json!({ "resolution": "2560x1440" }),
        ),
    ];

    let mut inserted = 0;
    for (name, part, brand, price, stock, description, specifications) in products {
        let result = sqlx::query(
            r#"
            INSERT INTO products (id, name, part, brand, price, stock, description, specifications)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(part)
        .bind(brand)
        .bind(price)
        .bind(stock)
        .bind(description)
        .bind(specifications)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    println!("Seeded products");
    Ok(inserted)
}
