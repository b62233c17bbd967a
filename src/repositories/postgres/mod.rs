//! PostgreSQL implementation of every repository trait.
//!
//! Queries are plain runtime `sqlx::query_as` calls mapped through `FromRow`.
//! Optional list filters use the `($n IS NULL OR column = $n)` form so one
//! statement serves every combination.

mod auth;
mod finance;
mod hr;
mod platform;
mod sales;
mod stock;

use async_trait::async_trait;

use crate::db::DbPool;
use crate::error::AppError;
use crate::pagination::PageRequest;

use super::HealthCheck;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// `LIMIT` and `OFFSET` bind values for a page request.
pub(crate) fn limit_offset(page: PageRequest) -> (i64, i64) {
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    (i64::from(page.limit), offset)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Turn a unique-index violation into a 409 with `message`, anything else into a database error.
pub(crate) fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        if is_unique_violation(&err) {
            AppError::Conflict(message.to_string())
        } else {
            AppError::Database(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_offset_follows_page() {
        assert_eq!(limit_offset(PageRequest::new(Some(3), Some(25))), (25, 50));
        assert_eq!(limit_offset(PageRequest::new(None, None)), (20, 0));
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        let mapped = conflict_on_unique("taken")(sqlx::Error::RowNotFound);
        assert!(matches!(mapped, AppError::Database(_)));
    }
}
