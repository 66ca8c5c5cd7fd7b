//! Order service: the placement, cancellation, item-removal, discount and
//! status pipelines.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use common::{Availability, Order, OrderId, OrderLine, OrderStatus, ProductId};
use store::{OrderFilter, StockAdjustment, StockSnapshot, Store, StoreTransaction};

use crate::caller::CallerContext;
use crate::error::{DomainError, Result};
use crate::pricing::OrderTotals;

use super::{DiscountRequest, PlaceOrderRequest, RemoveItemRequest, StatusRequest};

/// Service for managing orders.
///
/// Every mutation runs inside one store transaction spanning the Stock
/// Ledger and the Order Records. An early return drops the transaction,
/// which discards all buffered writes.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places a new order, allocating stock for every line.
    #[tracing::instrument(skip(self, request), fields(caller_role = ?caller.role))]
    pub async fn place_order(
        &self,
        caller: &CallerContext,
        request: PlaceOrderRequest,
    ) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_place_order(caller, request).await;
        observe("place_order", started, &result);

        if let Ok(order) = &result {
            metrics::counter!("orders_placed_total").increment(1);
            tracing::info!(
                order_id = %order.order_id,
                items = order.items.len(),
                grand_total = %order.grand_total,
                "order placed"
            );
        }
        result
    }

    async fn run_place_order(
        &self,
        caller: &CallerContext,
        request: PlaceOrderRequest,
    ) -> Result<Order> {
        let draft = request.validate()?;

        let mut tx = self.store.begin().await?;
        let snapshots = tx.stock_for(&draft.product_ids()).await?;
        let by_id: HashMap<&ProductId, &StockSnapshot> =
            snapshots.iter().map(|s| (&s.product_id, s)).collect();

        // Resolve every product before checking any quantity
        let mut resolved = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let snapshot = by_id
                .get(&line.product_id)
                .ok_or_else(|| DomainError::not_found("Product", &line.product_id))?;
            resolved.push((line, *snapshot));
        }

        for (line, snapshot) in &resolved {
            if line.quantity > snapshot.current_quantity {
                return Err(DomainError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available: snapshot.current_quantity,
                });
            }
        }

        // Lock order follows product ID
        let mut adjustments: Vec<_> = draft
            .lines
            .iter()
            .map(|line| StockAdjustment::sale(line.product_id.clone(), line.quantity))
            .collect();
        adjustments.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let levels = tx.adjust_stock(&adjustments).await?;
        let remaining: HashMap<&ProductId, u32> = levels
            .iter()
            .map(|level| (&level.product_id, level.current_quantity))
            .collect();

        let items = resolved
            .iter()
            .map(|(line, snapshot)| {
                let left = remaining
                    .get(&line.product_id)
                    .copied()
                    .ok_or_else(|| DomainError::not_found("Product", &line.product_id))?;
                Ok(OrderLine {
                    product_id: line.product_id.clone(),
                    product_name: snapshot.product_name.clone(),
                    product_description: snapshot.product_description.clone(),
                    image_url: snapshot.image_url.clone(),
                    unit_price: snapshot.unit_price,
                    quantity: line.quantity,
                    subtotal: line.subtotal,
                    current_availability_status: Availability::after_sale(left),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let order = Order {
            order_id: OrderId::generate(),
            customer_id: draft.customer_id,
            placed_by: caller.placed_by(),
            order_status: OrderStatus::Processing,
            order_date: Utc::now(),
            items,
            total_price: draft.totals.total_price,
            tax: draft.totals.tax,
            grand_total: draft.totals.grand_total,
            discount_in_percentage: draft.discount_in_percentage,
        };

        tx.insert_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Cancels an order and returns its stock to the ledger.
    ///
    /// Lines whose product has since been discontinued are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_cancel_order(order_id).await;
        observe("cancel_order", started, &result);

        if let Ok(order) = &result {
            metrics::counter!("orders_cancelled_total").increment(1);
            tracing::info!(order_id = %order.order_id, "order cancelled");
        }
        result
    }

    async fn run_cancel_order(&self, order_id: &OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = load_open_order(tx.as_mut(), order_id, "cancel").await?;

        let mut refunds: BTreeMap<ProductId, u32> = BTreeMap::new();
        for line in &order.items {
            *refunds.entry(line.product_id.clone()).or_default() += line.quantity;
        }

        let ids: Vec<_> = refunds.keys().cloned().collect();
        let present: HashSet<ProductId> = tx
            .stock_for(&ids)
            .await?
            .into_iter()
            .map(|s| s.product_id)
            .collect();

        let adjustments: Vec<_> = refunds
            .into_iter()
            .filter(|(id, _)| present.contains(id))
            .map(|(id, quantity)| StockAdjustment::restock_return(id, quantity))
            .collect();
        if !adjustments.is_empty() {
            tx.adjust_stock(&adjustments).await?;
        }

        order.order_status = OrderStatus::Cancelled;
        tx.save_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Removes one line from an order, restocking it and recomputing totals.
    ///
    /// The restock and the order update commit together.
    #[tracing::instrument(skip(self, request))]
    pub async fn remove_item(&self, order_id: &OrderId, request: RemoveItemRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_remove_item(order_id, request).await;
        observe("remove_item", started, &result);

        if let Ok(order) = &result {
            metrics::counter!("order_items_removed_total").increment(1);
            tracing::info!(
                order_id = %order.order_id,
                remaining = order.items.len(),
                "order item removed"
            );
        }
        result
    }

    async fn run_remove_item(&self, order_id: &OrderId, request: RemoveItemRequest) -> Result<Order> {
        let product_id = request.validate()?;

        let mut tx = self.store.begin().await?;
        let mut order = load_open_order(tx.as_mut(), order_id, "remove an item").await?;

        let position = order
            .items
            .iter()
            .position(|line| line.product_id == product_id)
            .ok_or_else(|| DomainError::not_found("Order item", &product_id))?;

        if order.items.len() == 1 {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot remove the only item of order {}; cancel the order instead",
                order.order_id
            )));
        }

        let line = order.items.remove(position);
        let in_ledger = !tx
            .stock_for(std::slice::from_ref(&line.product_id))
            .await?
            .is_empty();
        if in_ledger {
            tx.adjust_stock(&[StockAdjustment::restock_return(
                line.product_id.clone(),
                line.quantity,
            )])
            .await?;
        }

        OrderTotals::for_order(&order)?.apply_to(&mut order);
        tx.save_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Applies a percentage discount, replacing any earlier one.
    #[tracing::instrument(skip(self, request))]
    pub async fn add_discount(&self, order_id: &OrderId, request: DiscountRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_add_discount(order_id, request).await;
        observe("add_discount", started, &result);
        result
    }

    async fn run_add_discount(&self, order_id: &OrderId, request: DiscountRequest) -> Result<Order> {
        let pct = request.validate()?;

        let mut tx = self.store.begin().await?;
        let mut order = load_open_order(tx.as_mut(), order_id, "add a discount").await?;

        order.discount_in_percentage = Some(pct);
        OrderTotals::for_order(&order)?.apply_to(&mut order);

        tx.save_order(&order).await?;
        tx.commit().await?;
        tracing::info!(order_id = %order.order_id, %pct, "discount applied");
        Ok(order)
    }

    /// Moves an open order between `processing` and `shipped`.
    #[tracing::instrument(skip(self, request))]
    pub async fn change_status(&self, order_id: &OrderId, request: StatusRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_change_status(order_id, request).await;
        observe("change_status", started, &result);
        result
    }

    async fn run_change_status(&self, order_id: &OrderId, request: StatusRequest) -> Result<Order> {
        let next = request.validate()?;

        let mut tx = self.store.begin().await?;
        let mut order = load_open_order(tx.as_mut(), order_id, "change status").await?;

        if order.order_status == next {
            return Err(DomainError::InvalidState {
                order_id: order.order_id,
                status: next,
                action: "move to the status it already has",
            });
        }
        if !order.order_status.can_transition_to(next) {
            return Err(DomainError::InvalidState {
                order_id: order.order_id,
                status: order.order_status,
                action: "change status",
            });
        }

        let previous = order.order_status;
        order.order_status = next;
        tx.save_order(&order).await?;
        tx.commit().await?;
        tracing::info!(order_id = %order.order_id, %previous, %next, "order status changed");
        Ok(order)
    }

    /// Marks a shipped order as completed.
    #[tracing::instrument(skip(self))]
    pub async fn complete_order(&self, order_id: &OrderId) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_complete_order(order_id).await;
        observe("complete_order", started, &result);
        result
    }

    async fn run_complete_order(&self, order_id: &OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .load_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        if !order.order_status.can_complete() {
            return Err(DomainError::InvalidState {
                order_id: order.order_id,
                status: order.order_status,
                action: "complete",
            });
        }

        order.order_status = OrderStatus::Completed;
        tx.save_order(&order).await?;
        tx.commit().await?;
        tracing::info!(order_id = %order.order_id, "order completed");
        Ok(order)
    }

    /// Loads an order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Lists orders matching a filter, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(filter).await?)
    }
}

/// Loads an order inside a transaction, rejecting settled orders.
async fn load_open_order(
    tx: &mut dyn StoreTransaction,
    order_id: &OrderId,
    action: &'static str,
) -> Result<Order> {
    let order = tx
        .load_order(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Order", order_id))?;

    if order.is_settled() {
        return Err(DomainError::InvalidState {
            order_id: order.order_id,
            status: order.order_status,
            action,
        });
    }
    Ok(order)
}

fn observe<T>(operation: &'static str, started: Instant, result: &Result<T>) {
    metrics::histogram!("order_pipeline_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    if let Err(err) = result {
        metrics::counter!("order_rejections_total", "reason" => err.reason()).increment(1);
        match err {
            DomainError::TransactionFailure(_) => {
                tracing::error!(operation, error = %err, "order pipeline failed")
            }
            _ => tracing::warn!(operation, error = %err, "order pipeline rejected request"),
        }
    }
}
