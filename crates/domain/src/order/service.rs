//! Order service: the transaction coordinator plus the simple order queries.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::{Duration, NaiveDate, NaiveTime};
use common::{Money, OrderId, OrderLineId, ProductId};
use order_store::{
    NewOrder, OrderAggregate, OrderPage, OrderPatch, OrderQuery, OrderStore, Product,
    RevenueSummary, StoreTransaction,
};

use crate::error::{DomainError, Violation};

use super::availability::{self, Availability};
use super::reconcile::{self, QuantityOverflow, Reconciliation};
use super::{CreateOrder, LineRequest, UpdateOrder};

/// Service for managing orders against shared product stock.
///
/// Creation and update run as one store transaction each: product rows are
/// locked in ascending id order, availability is re-checked under the lock,
/// stock is adjusted and the order aggregate is written, then everything is
/// committed together. Any failure rolls the whole transaction back.
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order and reserves stock for its lines.
    #[tracing::instrument(skip(self, cmd), fields(order_code = %cmd.order_code))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderAggregate, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::NoLines);
        }
        check_quantities(&cmd.lines)?;

        let plan = match reconcile::for_create(&cmd.lines) {
            Ok(plan) => plan,
            Err(overflow) => return Err(self.overflow_rejection(overflow).await),
        };
        self.preflight(&plan).await?;

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let result = apply_create(&mut tx, &cmd, &plan).await;
        let aggregate = finish(tx, result).await;
        record_outcome("create", started, &aggregate);

        let aggregate = aggregate?;
        tracing::info!(
            order_id = %aggregate.order.id,
            total_price = %aggregate.order.total_price,
            "order created"
        );
        Ok(aggregate)
    }

    /// Changes the quantities of an order's existing lines and reconciles
    /// stock against the previously committed quantities.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn update_order(&self, cmd: UpdateOrder) -> Result<OrderAggregate, DomainError> {
        check_quantities(&cmd.lines)?;

        let existing = self
            .store
            .find_order(cmd.order_id)
            .await?
            .ok_or_else(|| DomainError::order_not_found(cmd.order_id))?;

        let plan = match reconcile::for_update(&cmd.lines, &existing.lines) {
            Ok(plan) => plan,
            Err(overflow) => return Err(self.overflow_rejection(overflow).await),
        };
        if !plan.dropped.is_empty() {
            tracing::warn!(dropped = ?plan.dropped, "ignoring products that are not on the order");
        }
        self.preflight(&plan).await?;

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let result = apply_update(&mut tx, &cmd, &plan.requested).await;
        let aggregate = finish(tx, result).await;
        record_outcome("update", started, &aggregate);

        let aggregate = aggregate?;
        tracing::info!(total_price = %aggregate.order.total_price, "order updated");
        Ok(aggregate)
    }

    /// Loads an order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<OrderAggregate, DomainError> {
        self.store
            .find_order(id)
            .await?
            .ok_or_else(|| DomainError::order_not_found(id))
    }

    /// Lists order headers matching a query, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage, DomainError> {
        Ok(self.store.list_orders(&query).await?)
    }

    /// Deletes an order and its lines. Reserved stock is not returned.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: OrderId) -> Result<(), DomainError> {
        if !self.store.delete_order(id).await? {
            return Err(DomainError::order_not_found(id));
        }
        metrics::counter!("orders_deleted_total").increment(1);
        Ok(())
    }

    /// Revenue and order count for orders last updated on `date`.
    ///
    /// The day runs from 00:00:00 UTC up to (not including) 00:00:00 UTC of
    /// the following day.
    #[tracing::instrument(skip(self))]
    pub async fn daily_report(&self, date: NaiveDate) -> Result<RevenueSummary, DomainError> {
        let from = date.and_time(NaiveTime::MIN).and_utc();
        let to = from + Duration::days(1);
        Ok(self.store.revenue_between(from, to).await?)
    }

    /// Unlocked availability check run before any transaction is opened.
    async fn preflight(&self, plan: &Reconciliation) -> Result<(), DomainError> {
        let found = self.store.find_products(&plan.touched()).await?;
        match availability::check(&plan.deltas, &found) {
            Availability::Approved => Ok(()),
            Availability::Rejected(violations) => Err(validation_failed(violations)),
        }
    }

    /// Rejects a request whose summed quantity for one product does not fit
    /// in an `i64`. No stock level can cover it.
    async fn overflow_rejection(&self, overflow: QuantityOverflow) -> DomainError {
        let found = match self.store.find_products(&[overflow.product_id]).await {
            Ok(found) => found,
            Err(e) => return e.into(),
        };
        let violation = match found.first() {
            Some(product) => Violation::insufficient_stock(product.id, product.quantity),
            None => Violation::not_found(overflow.product_id),
        };
        validation_failed(vec![violation])
    }
}

fn validation_failed(violations: Vec<Violation>) -> DomainError {
    metrics::counter!("order_rejections_total", "reason" => "validation").increment(1);
    tracing::info!(violations = violations.len(), "order rejected by availability check");
    DomainError::ValidationFailed(violations)
}

fn check_quantities(lines: &[LineRequest]) -> Result<(), DomainError> {
    match lines.iter().find(|l| l.quantity <= 0) {
        Some(line) => Err(DomainError::InvalidQuantity {
            product_id: line.product_id,
            quantity: line.quantity,
        }),
        None => Ok(()),
    }
}

/// Commits on success, rolls back on failure.
///
/// A failed rollback is logged and the original error is returned; the
/// store discards the transaction either way.
async fn finish<T, Tx: StoreTransaction>(
    tx: Tx,
    result: Result<T, DomainError>,
) -> Result<T, DomainError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

fn record_outcome<T>(operation: &'static str, started: Instant, result: &Result<T, DomainError>) {
    metrics::histogram!("order_transaction_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(_) if operation == "create" => {
            metrics::counter!("orders_created_total").increment(1);
        }
        Ok(_) => {
            metrics::counter!("orders_updated_total").increment(1);
        }
        Err(DomainError::Conflict(_)) => {
            metrics::counter!("order_rejections_total", "reason" => "conflict").increment(1);
            tracing::warn!(operation, "stock changed before the order could be committed");
        }
        Err(DomainError::Store(e)) => {
            metrics::counter!("order_rejections_total", "reason" => "internal").increment(1);
            tracing::error!(operation, error = %e, "order transaction failed");
        }
        Err(_) => {
            metrics::counter!("order_rejections_total", "reason" => "other").increment(1);
        }
    }
}

/// Re-checks availability against rows read under lock.
fn recheck(deltas: &BTreeMap<ProductId, i64>, locked: &[Product]) -> Result<(), DomainError> {
    match availability::check(deltas, locked) {
        Availability::Approved => Ok(()),
        Availability::Rejected(violations) => Err(DomainError::Conflict(violations)),
    }
}

async fn apply_deltas<Tx: StoreTransaction>(
    tx: &mut Tx,
    deltas: &BTreeMap<ProductId, i64>,
) -> Result<(), DomainError> {
    for (&product_id, &delta) in deltas {
        if delta == 0 {
            continue;
        }
        let remaining = tx.decrement_stock(product_id, delta).await?;
        debug_assert!(remaining >= 0);
        tracing::debug!(%product_id, delta, remaining, "stock adjusted");
    }
    Ok(())
}

/// Sum of `quantity * price` with prices taken from the locked rows.
fn total_price(
    lines: impl IntoIterator<Item = (ProductId, i64)>,
    locked: &[Product],
) -> Result<Money, DomainError> {
    let prices: HashMap<ProductId, Money> = locked.iter().map(|p| (p.id, p.price)).collect();
    lines
        .into_iter()
        .try_fold(Money::zero(), |total, (product_id, quantity)| {
            let price = prices.get(&product_id).ok_or(DomainError::NotFound {
                entity: "product",
                id: product_id.as_i64(),
            })?;
            price
                .checked_mul(quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or(DomainError::PriceOverflow { product_id })
        })
}

async fn apply_create<Tx: StoreTransaction>(
    tx: &mut Tx,
    cmd: &CreateOrder,
    plan: &Reconciliation,
) -> Result<OrderAggregate, DomainError> {
    let locked = tx.lock_products(&plan.touched()).await?;
    recheck(&plan.deltas, &locked)?;
    apply_deltas(tx, &plan.deltas).await?;

    let lines: Vec<(ProductId, i64)> = plan.requested.iter().map(|(&p, &q)| (p, q)).collect();
    let total = total_price(lines.iter().copied(), &locked)?;

    let order = tx
        .insert_order(NewOrder {
            order_code: cmd.order_code.clone(),
            order_type: cmd.order_type,
            order_status: cmd.order_status,
            total_price: total,
        })
        .await?;
    let lines = tx.insert_lines(order.id, &lines).await?;

    Ok(OrderAggregate { order, lines })
}

async fn apply_update<Tx: StoreTransaction>(
    tx: &mut Tx,
    cmd: &UpdateOrder,
    requested: &BTreeMap<ProductId, i64>,
) -> Result<OrderAggregate, DomainError> {
    // The order row lock serializes updates of the same order, so the lines
    // read here are the ones the deltas must be computed against.
    let current = tx
        .lock_order(cmd.order_id)
        .await?
        .ok_or_else(|| DomainError::order_not_found(cmd.order_id))?;
    let plan = reconcile::against_committed(requested, &current.lines);

    // Every product on the order is locked so that the total is priced from
    // rows read under lock. Untouched products only need to exist.
    let on_order: Vec<ProductId> = current.lines.iter().map(|l| l.product_id).collect();
    let locked = tx.lock_products(&on_order).await?;

    let mut required = plan.deltas.clone();
    for product_id in &on_order {
        required.entry(*product_id).or_insert(0);
    }
    recheck(&required, &locked)?;
    apply_deltas(tx, &plan.deltas).await?;

    let final_quantities: Vec<(ProductId, i64)> = current
        .lines
        .iter()
        .map(|l| {
            let quantity = plan.requested.get(&l.product_id).copied();
            (l.product_id, quantity.unwrap_or(l.quantity))
        })
        .collect();
    let total = total_price(final_quantities, &locked)?;

    let patches: Vec<(OrderLineId, i64)> = current
        .lines
        .iter()
        .filter_map(|l| plan.requested.get(&l.product_id).map(|&q| (l.id, q)))
        .collect();
    let updated = tx.update_line_quantities(&patches).await?;

    let order = tx
        .update_order(
            cmd.order_id,
            OrderPatch {
                order_type: cmd.order_type,
                order_status: cmd.order_status,
                total_price: total,
            },
        )
        .await?;

    let mut lines = current.lines;
    for line in updated {
        if let Some(slot) = lines.iter_mut().find(|l| l.id == line.id) {
            *slot = line;
        }
    }

    Ok(OrderAggregate { order, lines })
}
