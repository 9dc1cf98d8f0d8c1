//! storage error types.

use thiserror::Error;

/// errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// the label is already assigned to a different user.
    #[error("domain '{0}' is not owned by this user")]
    DomainNotOwned(String),

    /// a merge-write that changes nothing.
    #[error("empty update")]
    EmptyUpdate,

    /// invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// generic database error.
    #[error("database error: {0}")]
    Database(String),

    /// ephemeral store error.
    #[error("ephemeral store error: {0}")]
    Store(String),

    /// an ephemeral store call exceeded its deadline.
    #[error("ephemeral store call timed out")]
    Timeout,
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        match &err {
            sea_orm::DbErr::RecordNotFound(msg) => Error::NotFound(msg.clone()),
            sea_orm::DbErr::Conn(e) => Error::Connection(e.to_string()),
            sea_orm::DbErr::ConnectionAcquire(e) => Error::Connection(e.to_string()),
            _ => Error::Database(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            Error::Connection(err.to_string())
        } else {
            Error::Store(err.to_string())
        }
    }
}
