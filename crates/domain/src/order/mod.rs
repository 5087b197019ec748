//! Order creation, update and the supporting reconciliation and checks.

pub mod availability;
mod commands;
pub mod reconcile;
mod service;

pub use availability::Availability;
pub use commands::{CreateOrder, LineRequest, UpdateOrder};
pub use reconcile::Reconciliation;
pub use service::OrderService;
