//! HTTP API server for the retail order pipelines.
//!
//! Provides REST endpoints for placing and managing orders and for
//! maintaining the Stock Ledger, with structured logging (tracing) and
//! Prometheus metrics.

pub mod caller;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{InventoryService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub orders: OrderService<S>,
    pub inventory: InventoryService<S>,
    /// Name of the store backend, reported by `/health`.
    pub backend: &'static str,
}

/// Creates the application state over a store.
pub fn create_state<S: Store + Clone + 'static>(store: S, backend: &'static str) -> Arc<AppState<S>> {
    Arc::new(AppState {
        orders: OrderService::new(store.clone()),
        inventory: InventoryService::new(store),
        backend,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/orders",
            post(routes::orders::place::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/remove-item",
            post(routes::orders::remove_item::<S>),
        )
        .route("/orders/{id}/discount", post(routes::orders::discount::<S>))
        .route(
            "/orders/{id}/status",
            post(routes::orders::change_status::<S>),
        )
        .route("/orders/{id}/complete", post(routes::orders::complete::<S>))
        .route(
            "/categories",
            post(routes::inventory::create_category::<S>)
                .get(routes::inventory::list_categories::<S>),
        )
        .route(
            "/categories/{id}",
            get(routes::inventory::get_category::<S>),
        )
        .route(
            "/categories/{id}/products",
            post(routes::inventory::add_product::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::inventory::get_product::<S>).delete(routes::inventory::discontinue::<S>),
        )
        .route(
            "/products/{id}/restock",
            post(routes::inventory::restock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
