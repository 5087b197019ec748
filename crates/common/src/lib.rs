//! Shared types for the order system.

mod money;
mod types;

pub use money::Money;
pub use types::{OrderId, OrderLineId, ProductId};
