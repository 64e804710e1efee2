use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Creates a PostgreSQL connection pool and brings the schema up to date.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply database migrations")?;
    info!("Database migrations applied");

    Ok(pool)
}

/// `?page=&per_page=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn bounds(&self, max_per_page: u32) -> (i64, i64) {
        page_bounds(self.page, self.per_page, max_per_page)
    }
}

/// Converts 1-based page parameters into a `(limit, offset)` pair.
pub fn page_bounds(page: Option<u32>, per_page: Option<u32>, max_per_page: u32) -> (i64, i64) {
    let per_page = per_page.unwrap_or(20).clamp(1, max_per_page) as i64;
    let page = page.unwrap_or(1).max(1) as i64;
    (per_page, (page - 1) * per_page)
}
