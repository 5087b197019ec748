//! Stock availability checks.

use std::collections::{BTreeMap, HashMap};

use common::ProductId;
use order_store::Product;

use crate::error::Violation;

/// Outcome of an availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Approved,
    /// Never empty. Unknown products come first, then stock shortfalls,
    /// each in ascending product id order.
    Rejected(Vec<Violation>),
}

/// Checks that every product in `deltas` exists and can cover its delta.
///
/// All products are checked; the result lists every violation rather than
/// the first one. Negative and zero deltas only need the product to exist.
pub fn check(deltas: &BTreeMap<ProductId, i64>, found: &[Product]) -> Availability {
    let by_id: HashMap<ProductId, &Product> = found.iter().map(|p| (p.id, p)).collect();

    let mut violations: Vec<Violation> = deltas
        .keys()
        .filter(|id| !by_id.contains_key(id))
        .map(|id| Violation::not_found(*id))
        .collect();

    for (id, delta) in deltas {
        if let Some(product) = by_id.get(id)
            && *delta > 0
            && product.quantity < *delta
        {
            violations.push(Violation::insufficient_stock(*id, product.quantity));
        }
    }

    if violations.is_empty() {
        Availability::Approved
    } else {
        Availability::Rejected(violations)
    }
}
