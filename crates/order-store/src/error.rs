use thiserror::Error;

use crate::ProductId;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another order already uses this order code.
    #[error("Order code already exists: {0}")]
    DuplicateOrderCode(String),

    /// A stock write would have left a product below zero.
    #[error("Stock for product {0} would become negative")]
    NegativeStock(ProductId),

    /// A referenced row disappeared while the transaction was running.
    #[error("Row not found: {entity} {id}")]
    RowNotFound { entity: &'static str, id: i64 },

    /// A stored column held a value the model does not recognise.
    #[error("Invalid value {value:?} in column {column}")]
    InvalidColumn { column: &'static str, value: String },

    /// The store refused the operation (used by the in-memory store to
    /// simulate storage failures).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
