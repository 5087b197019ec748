//! Domain layer for the order system.
//!
//! This crate provides:
//! - the quantity reconciler that turns requested lines into stock deltas
//! - the availability check that reports every unavailable product
//! - `OrderService`, which runs creation and update as one locked store
//!   transaction and serves the simple order queries

pub mod error;
pub mod order;

pub use error::{DomainError, Violation, ViolationReason};
pub use order::{
    Availability, CreateOrder, LineRequest, OrderService, Reconciliation, UpdateOrder,
};
pub use order_store::{
    Order, OrderAggregate, OrderLine, OrderPage, OrderQuery, OrderStatus, OrderType, Product,
    RevenueSummary,
};
