use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Money, NewOrder, Order, OrderAggregate, OrderId, OrderLine, OrderLineId, OrderPage,
    OrderPatch, OrderQuery, Product, ProductId, Result, RevenueSummary, StoreError,
    store::{OrderStore, StoreTransaction},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    lines: BTreeMap<OrderLineId, OrderLine>,
    last_product_id: i64,
    last_order_id: i64,
    last_line_id: i64,
}

impl Tables {
    fn aggregate(&self, id: OrderId) -> Option<OrderAggregate> {
        let order = self.orders.get(&id)?.clone();
        let lines = self
            .lines
            .values()
            .filter(|l| l.order_id == id)
            .cloned()
            .collect();
        Some(OrderAggregate { order, lines })
    }

    fn products(&self, ids: &[ProductId]) -> Vec<Product> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        ids.iter()
            .filter_map(|id| self.products.get(id).cloned())
            .collect()
    }
}

/// In-memory order store for tests and local runs.
///
/// A transaction holds the whole store exclusively and works on a staged
/// copy of the tables, so transactions are fully serialized and a dropped
/// transaction leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<Mutex<Tables>>,
    fail_line_writes: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent order line write fail with `Unavailable`.
    pub fn set_fail_line_writes(&self, fail: bool) {
        self.fail_line_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the current stock of a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<i64> {
        self.tables.lock().await.products.get(&id).map(|p| p.quantity)
    }

    /// Returns the total number of order lines stored.
    pub async fn line_count(&self) -> usize {
        self.tables.lock().await.lines.len()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Overwrites an order's `updated_at`, for exercising time-window queries.
    pub async fn set_updated_at(&self, id: OrderId, at: DateTime<Utc>) {
        if let Some(order) = self.tables.lock().await.orders.get_mut(&id) {
            order.updated_at = at;
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            staged,
            fail_line_writes: self.fail_line_writes.load(Ordering::SeqCst),
        })
    }

    async fn insert_product(&self, name: &str, quantity: i64, price: Money) -> Result<Product> {
        let mut tables = self.tables.lock().await;
        tables.last_product_id += 1;
        let product = Product {
            id: ProductId::new(tables.last_product_id),
            name: name.to_string(),
            quantity,
            price,
        };
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(self.tables.lock().await.products(ids))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderAggregate>> {
        Ok(self.tables.lock().await.aggregate(id))
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<OrderPage> {
        let tables = self.tables.lock().await;
        let matching: Vec<&Order> = tables
            .orders
            .values()
            .rev()
            .filter(|o| query.matches(o))
            .collect();

        let data = matching
            .iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .map(|o| (*o).clone())
            .collect();

        Ok(OrderPage {
            total_count: matching.len() as i64,
            page: query.page,
            limit: query.limit,
            data,
        })
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.orders.remove(&id).is_none() {
            return Ok(false);
        }
        tables.lines.retain(|_, l| l.order_id != id);
        Ok(true)
    }

    async fn revenue_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RevenueSummary> {
        let tables = self.tables.lock().await;
        let in_window: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| o.updated_at >= from && o.updated_at < to)
            .collect();

        Ok(RevenueSummary {
            revenue: in_window.iter().map(|o| o.total_price).sum(),
            number_of_orders: in_window.len() as i64,
        })
    }
}

/// Transaction over an [`InMemoryOrderStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    fail_line_writes: bool,
}

impl InMemoryTransaction {
    fn check_line_writes(&self) -> Result<()> {
        if self.fail_line_writes {
            return Err(StoreError::Unavailable(
                "order line writes are disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderAggregate>> {
        Ok(self.staged.aggregate(id))
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(self.staged.products(ids))
    }

    async fn decrement_stock(&mut self, id: ProductId, delta: i64) -> Result<i64> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .ok_or(StoreError::RowNotFound {
                entity: "product",
                id: id.as_i64(),
            })?;

        let quantity = product.quantity - delta;
        if quantity < 0 {
            return Err(StoreError::NegativeStock(id));
        }
        product.quantity = quantity;
        Ok(quantity)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        if self
            .staged
            .orders
            .values()
            .any(|o| o.order_code == order.order_code)
        {
            return Err(StoreError::DuplicateOrderCode(order.order_code));
        }

        self.staged.last_order_id += 1;
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(self.staged.last_order_id),
            order_code: order.order_code,
            order_type: order.order_type,
            order_status: order.order_status,
            total_price: order.total_price,
            created_at: now,
            updated_at: now,
        };
        self.staged.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn insert_lines(
        &mut self,
        order_id: OrderId,
        lines: &[(ProductId, i64)],
    ) -> Result<Vec<OrderLine>> {
        self.check_line_writes()?;

        let mut inserted = Vec::with_capacity(lines.len());
        for &(product_id, quantity) in lines {
            self.staged.last_line_id += 1;
            let line = OrderLine {
                id: OrderLineId::new(self.staged.last_line_id),
                order_id,
                product_id,
                quantity,
            };
            self.staged.lines.insert(line.id, line.clone());
            inserted.push(line);
        }
        Ok(inserted)
    }

    async fn update_order(&mut self, id: OrderId, patch: OrderPatch) -> Result<Order> {
        let order = self
            .staged
            .orders
            .get_mut(&id)
            .ok_or(StoreError::RowNotFound {
                entity: "order",
                id: id.as_i64(),
            })?;

        if let Some(t) = patch.order_type {
            order.order_type = t;
        }
        if let Some(s) = patch.order_status {
            order.order_status = s;
        }
        order.total_price = patch.total_price;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn update_line_quantities(
        &mut self,
        lines: &[(OrderLineId, i64)],
    ) -> Result<Vec<OrderLine>> {
        self.check_line_writes()?;

        let mut updated = Vec::with_capacity(lines.len());
        for &(id, quantity) in lines {
            let line = self
                .staged
                .lines
                .get_mut(&id)
                .ok_or(StoreError::RowNotFound {
                    entity: "order_line",
                    id: id.as_i64(),
                })?;
            line.quantity = quantity;
            updated.push(line.clone());
        }
        Ok(updated)
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrderStatus, OrderType};

    fn new_order(code: &str, cents: i64) -> NewOrder {
        NewOrder {
            order_code: code.to_string(),
            order_type: OrderType::Online,
            order_status: OrderStatus::Pending,
            total_price: Money::from_cents(cents),
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryOrderStore::new();
        let p = store
            .insert_product("Widget", 10, Money::from_cents(500))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.decrement_stock(p.id, 3).await.unwrap(), 7);
        let order = tx.insert_order(new_order("ORD-1", 1500)).await.unwrap();
        tx.insert_lines(order.id, &[(p.id, 3)]).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(7));
        let found = store.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(found.lines.len(), 1);
        assert_eq!(found.lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryOrderStore::new();
        let p = store
            .insert_product("Widget", 10, Money::from_cents(500))
            .await
            .unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.decrement_stock(p.id, 4).await.unwrap();
            tx.insert_order(new_order("ORD-1", 2000)).await.unwrap();
        }

        assert_eq!(store.stock_of(p.id).await, Some(10));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn explicit_rollback_discards_writes() {
        let store = InMemoryOrderStore::new();
        let p = store
            .insert_product("Widget", 5, Money::from_cents(100))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.decrement_stock(p.id, 5).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(5));
    }

    #[tokio::test]
    async fn stock_never_goes_negative() {
        let store = InMemoryOrderStore::new();
        let p = store
            .insert_product("Widget", 2, Money::from_cents(100))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx.decrement_stock(p.id, 3).await;
        assert!(matches!(result, Err(StoreError::NegativeStock(id)) if id == p.id));
    }

    #[tokio::test]
    async fn duplicate_order_code_is_rejected() {
        let store = InMemoryOrderStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(new_order("ORD-1", 0)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx.insert_order(new_order("ORD-1", 0)).await;
        assert!(matches!(result, Err(StoreError::DuplicateOrderCode(code)) if code == "ORD-1"));
    }

    #[tokio::test]
    async fn lock_products_returns_ascending_and_skips_unknown() {
        let store = InMemoryOrderStore::new();
        let a = store
            .insert_product("A", 1, Money::from_cents(1))
            .await
            .unwrap();
        let b = store
            .insert_product("B", 1, Money::from_cents(1))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let locked = tx
            .lock_products(&[b.id, ProductId::new(99), a.id, b.id])
            .await
            .unwrap();
        let ids: Vec<_> = locked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn list_orders_filters_and_pages_newest_first() {
        let store = InMemoryOrderStore::new();
        let mut tx = store.begin().await.unwrap();
        for i in 1..=5 {
            let mut o = new_order(&format!("ORD-{i}"), 100);
            if i % 2 == 0 {
                o.order_status = OrderStatus::Completed;
            }
            tx.insert_order(o).await.unwrap();
        }
        tx.commit().await.unwrap();

        let page = store
            .list_orders(&OrderQuery::new().limit(2).page(1))
            .await
            .unwrap();
        assert_eq!(page.total_count, 5);
        let codes: Vec<_> = page.data.iter().map(|o| o.order_code.as_str()).collect();
        assert_eq!(codes, vec!["ORD-5", "ORD-4"]);

        let page = store
            .list_orders(&OrderQuery::new().order_status(OrderStatus::Completed))
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        assert!(
            page.data
                .iter()
                .all(|o| o.order_status == OrderStatus::Completed)
        );
    }

    #[tokio::test]
    async fn delete_removes_lines_but_not_stock() {
        let store = InMemoryOrderStore::new();
        let p = store
            .insert_product("Widget", 10, Money::from_cents(100))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.decrement_stock(p.id, 2).await.unwrap();
        let order = tx.insert_order(new_order("ORD-1", 200)).await.unwrap();
        tx.insert_lines(order.id, &[(p.id, 2)]).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.delete_order(order.id).await.unwrap());
        assert!(!store.delete_order(order.id).await.unwrap());
        assert_eq!(store.line_count().await, 0);
        assert_eq!(store.stock_of(p.id).await, Some(8));
    }

    #[tokio::test]
    async fn failing_line_writes_surface_as_unavailable() {
        let store = InMemoryOrderStore::new();
        store.set_fail_line_writes(true);

        let mut tx = store.begin().await.unwrap();
        let order = tx.insert_order(new_order("ORD-1", 0)).await.unwrap();
        let result = tx.insert_lines(order.id, &[(ProductId::new(1), 1)]).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn revenue_window_is_half_open() {
        let store = InMemoryOrderStore::new();
        let mut tx = store.begin().await.unwrap();
        let a = tx.insert_order(new_order("ORD-1", 1500)).await.unwrap();
        let b = tx.insert_order(new_order("ORD-2", 2500)).await.unwrap();
        tx.commit().await.unwrap();

        let from = "2024-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let to = "2024-03-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        store
            .set_updated_at(a.id, "2024-03-01T23:59:59Z".parse().unwrap())
            .await;
        store.set_updated_at(b.id, to).await;

        let summary = store.revenue_between(from, to).await.unwrap();
        assert_eq!(summary.revenue, Money::from_cents(1500));
        assert_eq!(summary.number_of_orders, 1);
    }
}
