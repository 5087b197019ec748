//! Turns requested lines into per-product stock deltas.

use std::collections::{BTreeMap, BTreeSet};

use common::ProductId;
use order_store::OrderLine;

use super::LineRequest;

/// Result of reconciling a request against an order's committed lines.
///
/// Maps are keyed by product id, so iteration is in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Net stock change per touched product. Positive reserves stock,
    /// negative returns it.
    pub deltas: BTreeMap<ProductId, i64>,

    /// Final line quantity per touched product.
    pub requested: BTreeMap<ProductId, i64>,

    /// Requested products that were left out because the order has no line
    /// for them.
    pub dropped: Vec<ProductId>,
}

impl Reconciliation {
    /// Distinct touched product ids, ascending.
    pub fn touched(&self) -> Vec<ProductId> {
        self.deltas.keys().copied().collect()
    }
}

/// A product's requested quantities add up to more than an `i64` can hold.
///
/// No stock level can cover such a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityOverflow {
    pub product_id: ProductId,
}

/// Sums requested quantities per product.
pub fn aggregate(lines: &[LineRequest]) -> Result<BTreeMap<ProductId, i64>, QuantityOverflow> {
    let mut totals: BTreeMap<ProductId, i64> = BTreeMap::new();
    for line in lines {
        let total = totals.entry(line.product_id).or_insert(0);
        *total = total.checked_add(line.quantity).ok_or(QuantityOverflow {
            product_id: line.product_id,
        })?;
    }
    Ok(totals)
}

/// Reconciles a new order: every requested unit must be reserved.
pub fn for_create(lines: &[LineRequest]) -> Result<Reconciliation, QuantityOverflow> {
    let requested = aggregate(lines)?;
    Ok(Reconciliation {
        deltas: requested.clone(),
        requested,
        dropped: Vec::new(),
    })
}

/// Reconciles an update against the order's committed lines.
///
/// Lines for products the order does not hold are set aside before summing
/// and reported in `dropped`.
pub fn for_update(
    lines: &[LineRequest],
    existing: &[OrderLine],
) -> Result<Reconciliation, QuantityOverflow> {
    let (kept, foreign): (Vec<LineRequest>, Vec<LineRequest>) = lines
        .iter()
        .copied()
        .partition(|l| existing.iter().any(|e| e.product_id == l.product_id));

    let mut plan = against_committed(&aggregate(&kept)?, existing);
    let dropped: BTreeSet<ProductId> = foreign.iter().map(|l| l.product_id).collect();
    plan.dropped = dropped.into_iter().collect();
    Ok(plan)
}

/// Reconciles already summed quantities against committed lines.
///
/// Only products already on the order are kept; the delta is the requested
/// quantity minus the committed one. Committed lines missing from the
/// request are left as they are.
pub fn against_committed(
    totals: &BTreeMap<ProductId, i64>,
    existing: &[OrderLine],
) -> Reconciliation {
    let mut out = Reconciliation::default();

    for (&product_id, &quantity) in totals {
        match existing.iter().find(|l| l.product_id == product_id) {
            Some(line) => {
                out.deltas.insert(product_id, quantity - line.quantity);
                out.requested.insert(product_id, quantity);
            }
            None => out.dropped.push(product_id),
        }
    }

    out
}
