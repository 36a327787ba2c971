use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connects to the database named by DATABASE_URL and runs migrations.
///
/// Returns None when DATABASE_URL is not set so store suites skip cleanly on
/// machines without Postgres.
pub async fn try_setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// Removes records created under the given key prefix.
///
/// Scoped so suites sharing one database can run in parallel without
/// deleting each other's rows.
pub async fn cleanup_test_data(pool: &PgPool, prefix: &str) {
    sqlx::query("DELETE FROM idempotency_records WHERE idempotency_key LIKE $1")
        .bind(format!("{}%", prefix))
        .execute(pool)
        .await
        .ok();
}

pub fn unique_key(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}
