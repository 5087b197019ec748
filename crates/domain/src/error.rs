//! Domain error types.

use common::ProductId;
use order_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Why a requested line cannot be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    NotFound,
    InsufficientStock,
}

/// One product that failed the availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_quantity: Option<i64>,
    pub reason: ViolationReason,
}

impl Violation {
    pub fn not_found(id: ProductId) -> Self {
        Self {
            id,
            available_quantity: None,
            reason: ViolationReason::NotFound,
        }
    }

    pub fn insufficient_stock(id: ProductId, available: i64) -> Self {
        Self {
            id,
            available_quantity: Some(available),
            reason: ViolationReason::InsufficientStock,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.reason, self.available_quantity) {
            (ViolationReason::InsufficientStock, Some(available)) => {
                write!(f, "product {}: insufficient stock ({available} available)", self.id)
            }
            (ViolationReason::InsufficientStock, None) => {
                write!(f, "product {}: insufficient stock", self.id)
            }
            (ViolationReason::NotFound, _) => write!(f, "product {}: not found", self.id),
        }
    }
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced order or product does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Requested lines failed the pre-flight availability check.
    /// Always carries every violation found.
    #[error("Order lines are not available: {}", describe(.0))]
    ValidationFailed(Vec<Violation>),

    /// Stock changed between the pre-flight check and the locked check.
    #[error("Stock changed while committing the order: {}", describe(.0))]
    Conflict(Vec<Violation>),

    /// A requested line quantity is not positive.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A line total or the order total does not fit in the money type.
    #[error("Order total overflows at product {product_id}")]
    PriceOverflow { product_id: ProductId },

    /// An order must be created with at least one line.
    #[error("Order has no lines")]
    NoLines,

    /// Another order already uses this order code.
    #[error("Order code already exists: {0}")]
    DuplicateOrderCode(String),

    /// Storage failure unrelated to business rules. The transaction has
    /// already been rolled back when this is returned.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub(crate) fn order_not_found(id: common::OrderId) -> Self {
        DomainError::NotFound {
            entity: "order",
            id: id.as_i64(),
        }
    }

    /// Violations carried by a validation or conflict error.
    pub fn violations(&self) -> &[Violation] {
        match self {
            DomainError::ValidationFailed(v) | DomainError::Conflict(v) => v,
            _ => &[],
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateOrderCode(code) => DomainError::DuplicateOrderCode(code),
            other => DomainError::Store(other),
        }
    }
}
