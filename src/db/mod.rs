mod error;
mod models;
mod repositories;
mod store;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config;

pub use error::DatabaseError;
pub use models::*;
pub use repositories::PgBookingStore;
pub use store::BookingStore;

/// Initialize the database connection pool
pub async fn init_pool() -> Result<PgPool, DatabaseError> {
    let config = config::get();
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections.unwrap_or(10))
        .min_connections(config.database.min_connections.unwrap_or(1))
        .connect(&config.database.url)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}
