use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Money, NewOrder, Order, OrderAggregate, OrderId, OrderLine, OrderLineId, OrderPage,
    OrderPatch, OrderQuery, Product, ProductId, Result, RevenueSummary,
};

/// Core trait for order store implementations.
///
/// Methods on the store itself are single-statement reads and writes with no
/// cross-row guarantees. Anything that has to change stock and order rows
/// together runs inside a [`StoreTransaction`] returned by [`begin`].
///
/// All implementations must be thread-safe (Send + Sync).
///
/// [`begin`]: OrderStore::begin
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The transaction handle this store hands out.
    type Transaction: StoreTransaction;

    /// Opens a transaction.
    ///
    /// The returned handle must be finished with [`StoreTransaction::commit`]
    /// or [`StoreTransaction::rollback`]; dropping it rolls back.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Inserts a product row with the given stock and price.
    async fn insert_product(&self, name: &str, quantity: i64, price: Money) -> Result<Product>;

    /// Reads products by id without locking. Unknown ids are omitted.
    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Reads an order and its lines without locking.
    async fn find_order(&self, id: OrderId) -> Result<Option<OrderAggregate>>;

    /// Lists order headers matching a query, newest first.
    async fn list_orders(&self, query: &OrderQuery) -> Result<OrderPage>;

    /// Deletes an order and its lines. Product stock is not touched.
    ///
    /// Returns false if no order had this id.
    async fn delete_order(&self, id: OrderId) -> Result<bool>;

    /// Sums `total_price` and counts orders whose `updated_at` lies in
    /// `[from, to)`.
    async fn revenue_between(&self, from: DateTime<Utc>, to: DateTime<Utc>)
    -> Result<RevenueSummary>;
}

/// A unit of work against the store.
///
/// Row locks taken through this handle are held until it is committed,
/// rolled back or dropped.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Locks an order row and reads it together with its lines.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderAggregate>>;

    /// Locks product rows in ascending id order and returns the ones found.
    ///
    /// Every caller locks in the same order, so two transactions touching
    /// overlapping products cannot deadlock.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Subtracts `delta` from a product's stock and returns the new quantity.
    ///
    /// A negative delta returns stock. Fails with `NegativeStock` if the
    /// result would drop below zero.
    async fn decrement_stock(&mut self, id: ProductId, delta: i64) -> Result<i64>;

    /// Inserts an order header.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Inserts one line per `(product, quantity)` pair for an order.
    async fn insert_lines(
        &mut self,
        order_id: OrderId,
        lines: &[(ProductId, i64)],
    ) -> Result<Vec<OrderLine>>;

    /// Patches an order header and bumps its `updated_at`.
    async fn update_order(&mut self, id: OrderId, patch: OrderPatch) -> Result<Order>;

    /// Sets the quantity of existing lines by line id.
    async fn update_line_quantities(
        &mut self,
        lines: &[(OrderLineId, i64)],
    ) -> Result<Vec<OrderLine>>;

    /// Makes every write in this transaction visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write in this transaction.
    async fn rollback(self) -> Result<()>;
}
