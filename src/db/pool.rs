use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

use crate::config::Config;

/// Connects the pool and applies the embedded migrations.
pub async fn get_db_pool() -> anyhow::Result<Pool<Postgres>> {
    let config = Config::get();
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}
