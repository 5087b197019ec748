//! Persistence for orders, order lines and product stock.
//!
//! The store is the only place rows are read or written. Mutations that must
//! be atomic go through a [`StoreTransaction`] obtained from
//! [`OrderStore::begin`]; dropping a transaction without committing it rolls
//! it back.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{Money, OrderId, OrderLineId, ProductId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderStore, InMemoryTransaction};
pub use model::{
    NewOrder, Order, OrderAggregate, OrderLine, OrderPatch, OrderStatus, OrderType, Product,
};
pub use postgres::{PostgresOrderStore, PostgresTransaction};
pub use query::{OrderPage, OrderQuery, RevenueSummary};
pub use store::{OrderStore, StoreTransaction};
