//5
pub mod messagedb;
pub mod ticketdb;
pub mod userdb;

#[cfg(test)]
pub mod memorydb;

use sqlx::{Pool, Postgres};
use thiserror::Error;

pub use messagedb::MessageExt;
pub use ticketdb::TicketExt;
pub use userdb::UserExt;

pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const USERS_USERNAME_KEY: &str = "users_username_key";

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    /// Carries the name of the violated constraint, e.g. `users_username_key`.
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, DbError::UniqueViolation { constraint: c } if c == constraint)
    }
}

/// Lifts unique violations out of the driver error so callers can react to them.
pub(crate) fn classify(error: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return DbError::UniqueViolation {
                constraint: db_error.constraint().unwrap_or_default().to_string(),
            };
        }
    }

    DbError::Sqlx(error)
}

/// Everything the handlers need from persistence.
pub trait DataStore: UserExt + TicketExt + MessageExt + std::fmt::Debug + Send + Sync {}

impl<T> DataStore for T where T: UserExt + TicketExt + MessageExt + std::fmt::Debug + Send + Sync {}

pub(crate) fn offset(page: u32, limit: u32) -> i64 {
    (page.max(1) as i64 - 1) * limit as i64
}
