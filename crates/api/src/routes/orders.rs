//! Order endpoints: create, list, fetch, update, delete and the daily report.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, ProductId};
use domain::{
    CreateOrder, LineRequest, Order, OrderAggregate, OrderLine, OrderQuery, OrderService,
    OrderStatus, OrderType, UpdateOrder,
};
use order_store::OrderStore;
use order_store::query::MAX_LIMIT;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub order_service: OrderService<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

impl From<&OrderLineRequest> for LineRequest {
    fn from(req: &OrderLineRequest) -> Self {
        LineRequest::new(ProductId::new(req.product_id), req.quantity)
    }
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub order_code: String,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    pub products: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    /// Accepted only so that it can be rejected explicitly.
    pub order_code: Option<String>,
    pub order_type: Option<OrderType>,
    pub order_status: Option<OrderStatus>,
    #[serde(default)]
    pub products: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub id: Option<i64>,
    pub order_code: Option<String>,
    pub order_type: Option<OrderType>,
    pub order_status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DailyReportParams {
    pub date: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub order_code: String,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    pub total_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<OrderLineResponse>>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub total_count: i64,
    pub page: u32,
    pub limit: u32,
    pub data: Vec<OrderResponse>,
}

#[derive(Serialize)]
pub struct DailyReportResponse {
    pub date: NaiveDate,
    pub revenue_cents: i64,
    pub number_of_orders: i64,
}

impl OrderResponse {
    fn header(order: Order) -> Self {
        Self {
            id: order.id.as_i64(),
            order_code: order.order_code,
            order_type: order.order_type,
            order_status: order.order_status,
            total_price_cents: order.total_price.cents(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            lines: None,
        }
    }
}

impl From<OrderAggregate> for OrderResponse {
    fn from(aggregate: OrderAggregate) -> Self {
        let lines = aggregate.lines.iter().map(OrderLineResponse::from).collect();
        Self {
            lines: Some(lines),
            ..Self::header(aggregate.order)
        }
    }
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            id: line.id.as_i64(),
            product_id: line.product_id.as_i64(),
            quantity: line.quantity,
        }
    }
}

// -- Handlers --

/// POST /orders — create an order and reserve stock for its lines.
#[tracing::instrument(skip(state, req), fields(order_code = %req.order_code))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let cmd = CreateOrder {
        order_code: req.order_code,
        order_type: req.order_type,
        order_status: req.order_status,
        lines: req.products.iter().map(LineRequest::from).collect(),
    };

    let aggregate = state.order_service.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(aggregate.into())))
}

/// GET /orders — filtered, paged listing, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let query = build_query(params)?;
    let page = state.order_service.list_orders(query).await?;

    Ok(Json(OrderListResponse {
        total_count: page.total_count,
        page: page.page,
        limit: page.limit,
        data: page.data.into_iter().map(OrderResponse::header).collect(),
    }))
}

/// GET /orders/{id} — an order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let aggregate = state.order_service.get_order(order_id).await?;
    Ok(Json(aggregate.into()))
}

/// PATCH /orders/{id} — change header fields and reconcile line quantities.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    if req.order_code.is_some() {
        return Err(ApiError::BadRequest(
            "order_code cannot be changed".to_string(),
        ));
    }

    let cmd = UpdateOrder {
        order_id,
        order_type: req.order_type,
        order_status: req.order_status,
        lines: req.products.iter().map(LineRequest::from).collect(),
    };

    let aggregate = state.order_service.update_order(cmd).await?;
    Ok(Json(aggregate.into()))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id = parse_order_id(&id)?;
    state.order_service.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /orders/report/daily?date=YYYY-MM-DD — revenue and order count for
/// orders last updated on that UTC day.
#[tracing::instrument(skip(state))]
pub async fn daily_report<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<DailyReportParams>,
) -> Result<Json<DailyReportResponse>, ApiError> {
    let date = NaiveDate::parse_from_str(&params.date, "%Y-%m-%d")
        .map_err(|e| ApiError::BadRequest(format!("Invalid date {:?}: {e}", params.date)))?;

    let summary = state.order_service.daily_report(date).await?;
    Ok(Json(DailyReportResponse {
        date,
        revenue_cents: summary.revenue.cents(),
        number_of_orders: summary.number_of_orders,
    }))
}

// -- Helpers --

fn parse_order_id(s: &str) -> Result<OrderId, ApiError> {
    s.parse::<i64>()
        .map(OrderId::new)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id {s:?}: {e}")))
}

fn build_query(params: ListOrdersParams) -> Result<OrderQuery, ApiError> {
    let mut query = OrderQuery::new();

    if let Some(page) = params.page {
        if page == 0 {
            return Err(ApiError::BadRequest("page must be at least 1".to_string()));
        }
        query = query.page(page);
    }
    if let Some(limit) = params.limit {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        query = query.limit(limit);
    }
    if let Some(id) = params.id {
        query = query.id(OrderId::new(id));
    }
    if let Some(code) = params.order_code {
        query = query.order_code(code);
    }
    if let Some(order_type) = params.order_type {
        query = query.order_type(order_type);
    }
    if let Some(status) = params.order_status {
        query = query.order_status(status);
    }

    Ok(query)
}
