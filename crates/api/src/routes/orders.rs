//! Order pipeline endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CustomerId, Order, OrderId, OrderStatus};
use domain::{DiscountRequest, PlaceOrderRequest, RemoveItemRequest, StatusRequest};
use serde::Deserialize;
use store::{OrderFilter, Store};

use crate::AppState;
use crate::caller::Caller;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(rename = "customerID")]
    pub customer_id: Option<String>,
    pub status: Option<String>,
}

impl ListOrdersQuery {
    fn into_filter(self) -> Result<OrderFilter, ApiError> {
        let mut filter = OrderFilter::new();
        if let Some(id) = self.customer_id.as_deref().map(str::trim)
            && !id.is_empty()
        {
            filter = filter.customer(CustomerId::from(id));
        }
        if let Some(label) = self.status {
            let status = OrderStatus::from_label(label.trim())
                .ok_or_else(|| ApiError::BadRequest(format!("unknown order status: {label}")))?;
            filter = filter.status(status);
        }
        Ok(filter)
    }
}

pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// POST /orders: place a new order.
#[tracing::instrument(skip(state, payload))]
pub async fn place<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(request) = payload?;
    let order = state.orders.place_order(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders: list orders, optionally by customer and status.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(query) = query?;
    let orders = state.orders.list_orders(query.into_filter()?).await?;
    Ok(Json(orders))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orders.get_order(&order_id).await?))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orders.cancel_order(&order_id).await?))
}

/// POST /orders/{id}/remove-item
#[tracing::instrument(skip(state, payload))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<RemoveItemRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(request) = payload?;
    Ok(Json(state.orders.remove_item(&order_id, request).await?))
}

/// POST /orders/{id}/discount
#[tracing::instrument(skip(state, payload))]
pub async fn discount<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<DiscountRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(request) = payload?;
    Ok(Json(state.orders.add_discount(&order_id, request).await?))
}

/// POST /orders/{id}/status
#[tracing::instrument(skip(state, payload))]
pub async fn change_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(request) = payload?;
    Ok(Json(state.orders.change_status(&order_id, request).await?))
}

/// POST /orders/{id}/complete
#[tracing::instrument(skip(state))]
pub async fn complete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orders.complete_order(&order_id).await?))
}
