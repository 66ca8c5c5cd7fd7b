//! Catalog and stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Category, CategoryId, Product, ProductId};
use domain::{Discontinued, NewCategory, NewProduct, RestockRequest};
use store::Store;

use crate::AppState;
use crate::error::ApiError;

fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    ProductId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_category_id(raw: &str) -> Result<CategoryId, ApiError> {
    CategoryId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// POST /categories
#[tracing::instrument(skip(state, payload))]
pub async fn create_category<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let Json(request) = payload?;
    let category = state.inventory.create_category(request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /categories
#[tracing::instrument(skip(state))]
pub async fn list_categories<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.inventory.list_categories().await?))
}

/// GET /categories/{id}
#[tracing::instrument(skip(state))]
pub async fn get_category<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let category_id = parse_category_id(&id)?;
    Ok(Json(state.inventory.get_category(&category_id).await?))
}

/// POST /categories/{id}/products
#[tracing::instrument(skip(state, payload))]
pub async fn add_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let category_id = parse_category_id(&id)?;
    let Json(request) = payload?;
    let product = state.inventory.add_product(&category_id, request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id = parse_product_id(&id)?;
    Ok(Json(state.inventory.get_product(&product_id).await?))
}

/// POST /products/{id}/restock: an empty body restocks the configured quantity.
#[tracing::instrument(skip(state, body))]
pub async fn restock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Product>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RestockRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid restock body: {e}")))?
    };
    Ok(Json(state.inventory.restock(&product_id, request).await?))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn discontinue<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Discontinued>, ApiError> {
    let product_id = parse_product_id(&id)?;
    Ok(Json(state.inventory.discontinue_product(&product_id).await?))
}
