mod credential_repo_mysql;
mod refresh_token_store_mysql;

pub use credential_repo_mysql::*;
pub use refresh_token_store_mysql::*;

mod util;

use crate::domain_port::StoreError;
use sqlx::MySqlPool;

const SCHEMA: &str = include_str!("schema.sql");

/// Create the tables this service owns if they are missing.
pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(util::store_error)?;
    Ok(())
}
