//! Persisted row shapes.
//!
//! Orders own their lines; a line refers to its product by identifier only,
//! so stock writes and line writes stay independent and are joined by id.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, OrderLineId, ProductId, StoreError};

/// A stocked product. Rows are created and priced outside the order flow;
/// order operations only ever change `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub price: Money,
}

/// How an order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Online,
    InStore,
}

/// Status tag carried on an order. No transition rules are attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Online => "online",
            OrderType::InStore => "in_store",
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(OrderType::Online),
            "in_store" => Ok(OrderType::InStore),
            other => Err(StoreError::InvalidColumn {
                column: "order_type",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(StoreError::InvalidColumn {
                column: "order_status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_code: String,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// An order together with all of its lines, ordered by line id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAggregate {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

impl OrderAggregate {
    /// Returns the line for a product, if the order has one.
    pub fn line_for(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }
}

/// Values for inserting a new order header.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: String,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    pub total_price: Money,
}

/// Values for patching an existing order header. `None` keeps the stored value.
#[derive(Debug, Clone)]
pub struct OrderPatch {
    pub order_type: Option<OrderType>,
    pub order_status: Option<OrderStatus>,
    pub total_price: Money,
}
