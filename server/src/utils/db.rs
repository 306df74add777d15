use anyhow::Error as AnyError;
use sqlx::migrate::MigrateError;
use sqlx::{Pool, Sqlite};

fn database_message_contains(err: &AnyError, needle: &str) -> bool {
    if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
        if let sqlx::Error::Database(db_error) = sqlx_err {
            return db_error.message().contains(needle);
        }
    }

    false
}

/// A redelivered event hitting a primary-key or unique constraint.
pub fn is_unique_violation(err: &AnyError) -> bool {
    database_message_contains(err, "UNIQUE constraint failed")
}

/// A write whose referenced mirror row (user or workspace) is absent.
pub fn is_foreign_key_violation(err: &AnyError) -> bool {
    database_message_contains(err, "FOREIGN KEY constraint failed")
}

pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
