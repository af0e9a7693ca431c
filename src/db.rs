use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::api_error::ApiError;
use crate::config::Config;

pub type DbPool = PgPool;

pub async fn connect(config: &Config) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_size)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

pub async fn health_check(pool: &DbPool) -> Result<(), ApiError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
