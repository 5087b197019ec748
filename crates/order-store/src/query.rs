use serde::Serialize;

use crate::{Money, Order, OrderId, OrderStatus, OrderType};

/// Default page size for order listings.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a listing will return.
pub const MAX_LIMIT: u32 = 100;

/// Builder for order listing queries.
///
/// Filters combine with AND. Results are ordered by id, newest first, and
/// paged with a 1-based page number.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    /// Filter by order id.
    pub id: Option<OrderId>,

    /// Filter by exact order code.
    pub order_code: Option<String>,

    /// Filter by order type.
    pub order_type: Option<OrderType>,

    /// Filter by order status.
    pub order_status: Option<OrderStatus>,

    /// 1-based page number.
    pub page: u32,

    /// Maximum number of orders per page.
    pub limit: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            id: None,
            order_code: None,
            order_type: None,
            order_status: None,
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl OrderQuery {
    /// Creates a query for the first page with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by order id.
    pub fn id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    /// Filters by order code.
    pub fn order_code(mut self, code: impl Into<String>) -> Self {
        self.order_code = Some(code.into());
        self
    }

    /// Filters by order type.
    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    /// Filters by order status.
    pub fn order_status(mut self, status: OrderStatus) -> Self {
        self.order_status = Some(status);
        self
    }

    /// Selects a page. Page numbers below 1 are treated as 1.
    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Sets the page size, clamped to `1..=MAX_LIMIT`.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    /// Number of rows to skip for the selected page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }

    /// Returns true if the order passes every filter.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(id) = self.id
            && order.id != id
        {
            return false;
        }
        if let Some(ref code) = self.order_code
            && &order.order_code != code
        {
            return false;
        }
        if let Some(t) = self.order_type
            && order.order_type != t
        {
            return false;
        }
        if let Some(s) = self.order_status
            && order.order_status != s
        {
            return false;
        }
        true
    }
}

/// One page of an order listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    /// Number of orders matching the filters across all pages.
    pub total_count: i64,
    pub page: u32,
    pub limit: u32,
    pub data: Vec<Order>,
}

/// Revenue and order count over a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevenueSummary {
    pub revenue: Money,
    pub number_of_orders: i64,
}
