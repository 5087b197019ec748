//! Commands accepted by the order service.

use common::{OrderId, ProductId};
use order_store::{OrderStatus, OrderType};
use serde::Deserialize;

/// One requested `(product, quantity)` pair. The same product may appear
/// more than once in a request; quantities are summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to create an order and reserve stock for its lines.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_code: String,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    pub lines: Vec<LineRequest>,
}

impl CreateOrder {
    /// Creates a command with no lines.
    pub fn new(
        order_code: impl Into<String>,
        order_type: OrderType,
        order_status: OrderStatus,
    ) -> Self {
        Self {
            order_code: order_code.into(),
            order_type,
            order_status,
            lines: Vec::new(),
        }
    }

    /// Adds a requested line.
    pub fn with_line(mut self, product_id: ProductId, quantity: i64) -> Self {
        self.lines.push(LineRequest::new(product_id, quantity));
        self
    }
}

/// Command to change the quantities of an order's existing lines.
///
/// The order code cannot be changed. Lines for products the order does not
/// already contain are ignored.
#[derive(Debug, Clone)]
pub struct UpdateOrder {
    pub order_id: OrderId,
    pub order_type: Option<OrderType>,
    pub order_status: Option<OrderStatus>,
    pub lines: Vec<LineRequest>,
}

impl UpdateOrder {
    /// Creates a command that changes nothing.
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            order_type: None,
            order_status: None,
            lines: Vec::new(),
        }
    }

    /// Adds a requested line.
    pub fn with_line(mut self, product_id: ProductId, quantity: i64) -> Self {
        self.lines.push(LineRequest::new(product_id, quantity));
        self
    }

    /// Sets the order type.
    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    /// Sets the order status.
    pub fn order_status(mut self, status: OrderStatus) -> Self {
        self.order_status = Some(status);
        self
    }
}
