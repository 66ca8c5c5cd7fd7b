use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    Availability, Category, CategoryId, Order, OrderId, Product, ProductId, StockStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    OrderFilter, Result, StockAdjustment, StockChange, StockLevel, StockSnapshot, StoreError,
    store::{Store, StoreTransaction},
};

#[derive(Debug, Clone, Default)]
struct Documents {
    categories: Vec<Category>,
    orders: HashMap<OrderId, Order>,
}

impl Documents {
    fn product(&self, product_id: &ProductId) -> Option<&Product> {
        self.categories
            .iter()
            .flat_map(|c| c.products.iter())
            .find(|p| &p.product_id == product_id)
    }

    fn product_mut(&mut self, product_id: &ProductId) -> Option<&mut Product> {
        self.categories
            .iter_mut()
            .flat_map(|c| c.products.iter_mut())
            .find(|p| &p.product_id == product_id)
    }
}

/// In-memory store implementation for tests and single-node runs.
///
/// Transactions are serialised: `begin` takes an owned lock on the whole
/// document set and works on a staged copy, which `commit` writes back.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<Mutex<Documents>>,
    fail_next_order_write: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next order insert or save fail with `Unavailable`.
    pub fn fail_next_order_write(&self) {
        self.fail_next_order_write.store(true, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.documents.lock().await.orders.len()
    }

    /// Clears all categories and orders.
    pub async fn clear(&self) {
        let mut documents = self.documents.lock().await;
        documents.categories.clear();
        documents.orders.clear();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let guard = self.documents.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            fail_next_order_write: self.fail_next_order_write.clone(),
        }))
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.documents.lock().await.orders.get(order_id).cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let documents = self.documents.lock().await;
        let mut orders: Vec<_> = documents
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();

        // Newest first, ID as tie-breaker
        orders.sort_by(|a, b| {
            b.order_date
                .cmp(&a.order_date)
                .then(a.order_id.cmp(&b.order_id))
        });
        Ok(orders)
    }

    async fn get_category(&self, category_id: &CategoryId) -> Result<Option<Category>> {
        let documents = self.documents.lock().await;
        Ok(documents
            .categories
            .iter()
            .find(|c| &c.category_id == category_id)
            .cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.documents.lock().await.categories.clone())
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.documents.lock().await.product(product_id).cloned())
    }
}

/// Transaction over the in-memory document set.
struct InMemoryTransaction {
    guard: OwnedMutexGuard<Documents>,
    staged: Documents,
    fail_next_order_write: Arc<AtomicBool>,
}

impl InMemoryTransaction {
    fn check_injected_fault(&self) -> Result<()> {
        if self.fail_next_order_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected order write failure".into()));
        }
        Ok(())
    }
}

/// Adds `added` to a stock counter, refusing to wrap or clamp.
fn increment(product_id: &ProductId, field: &'static str, current: u32, added: u32) -> Result<u32> {
    current
        .checked_add(added)
        .ok_or_else(|| StoreError::QuantityOverflow {
            product_id: product_id.clone(),
            field,
            current,
            added,
        })
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn stock_for(&mut self, product_ids: &[ProductId]) -> Result<Vec<StockSnapshot>> {
        Ok(product_ids
            .iter()
            .filter_map(|id| self.staged.product(id))
            .map(StockSnapshot::from)
            .collect())
    }

    async fn adjust_stock(&mut self, adjustments: &[StockAdjustment]) -> Result<Vec<StockLevel>> {
        let mut levels = Vec::with_capacity(adjustments.len());

        for adjustment in adjustments {
            let product = self
                .staged
                .product_mut(&adjustment.product_id)
                .ok_or_else(|| StoreError::ProductMissing(adjustment.product_id.clone()))?;
            let stock = &mut product.stock_info;

            match adjustment.change {
                StockChange::Sale(n) => {
                    if stock.current_quantity < n {
                        return Err(StoreError::StockConflict {
                            product_id: adjustment.product_id.clone(),
                            requested: n,
                            available: stock.current_quantity,
                        });
                    }
                    let total_sold =
                        increment(&adjustment.product_id, "totalSold", stock.total_sold, n)?;
                    stock.current_quantity -= n;
                    stock.total_sold = total_sold;
                    stock.stock_status =
                        StockStatus::for_quantity(stock.current_quantity, stock.restock_threshold);
                }
                StockChange::Return(n) => {
                    stock.current_quantity = increment(
                        &adjustment.product_id,
                        "currentQuantity",
                        stock.current_quantity,
                        n,
                    )?;
                    stock.total_sold = stock.total_sold.saturating_sub(n);
                    stock.stock_status =
                        StockStatus::after_return(stock.current_quantity, stock.restock_threshold);
                }
                StockChange::Restock(n) => {
                    stock.current_quantity = increment(
                        &adjustment.product_id,
                        "currentQuantity",
                        stock.current_quantity,
                        n,
                    )?;
                    stock.last_restock = Utc::now();
                    stock.stock_status =
                        StockStatus::for_quantity(stock.current_quantity, stock.restock_threshold);
                }
            }

            levels.push(StockLevel {
                product_id: adjustment.product_id.clone(),
                current_quantity: stock.current_quantity,
                total_sold: stock.total_sold,
                stock_status: stock.stock_status,
            });
        }

        Ok(levels)
    }

    async fn load_order(&mut self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(order_id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.check_injected_fault()?;
        if self.staged.orders.contains_key(&order.order_id) {
            return Err(StoreError::Duplicate {
                entity: "order",
                id: order.order_id.to_string(),
            });
        }
        self.staged
            .orders
            .insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        self.check_injected_fault()?;
        let slot = self
            .staged
            .orders
            .get_mut(&order.order_id)
            .ok_or_else(|| StoreError::OrderMissing(order.order_id.clone()))?;
        *slot = order.clone();
        Ok(())
    }

    async fn insert_category(&mut self, category: &Category) -> Result<()> {
        if self
            .staged
            .categories
            .iter()
            .any(|c| c.category_id == category.category_id)
        {
            return Err(StoreError::Duplicate {
                entity: "category",
                id: category.category_id.to_string(),
            });
        }
        self.staged.categories.push(category.clone());
        Ok(())
    }

    async fn insert_product(&mut self, category_id: &CategoryId, product: &Product) -> Result<()> {
        if self.staged.product(&product.product_id).is_some() {
            return Err(StoreError::Duplicate {
                entity: "product",
                id: product.product_id.to_string(),
            });
        }
        let category = self
            .staged
            .categories
            .iter_mut()
            .find(|c| &c.category_id == category_id)
            .ok_or_else(|| StoreError::CategoryMissing(category_id.clone()))?;
        category.products.push(product.clone());
        Ok(())
    }

    async fn remove_product(&mut self, product_id: &ProductId) -> Result<Option<Product>> {
        for category in &mut self.staged.categories {
            if let Some(pos) = category
                .products
                .iter()
                .position(|p| &p.product_id == product_id)
            {
                return Ok(Some(category.products.remove(pos)));
            }
        }
        Ok(None)
    }

    async fn mark_lines_unavailable(&mut self, product_id: &ProductId) -> Result<u64> {
        let mut touched = 0;
        for order in self.staged.orders.values_mut() {
            if order.is_settled() {
                continue;
            }
            let mut hit = false;
            for line in order
                .items
                .iter_mut()
                .filter(|l| &l.product_id == product_id)
            {
                line.current_availability_status = Availability::Unavailable;
                hit = true;
            }
            if hit {
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CustomerId, Money, OrderStatus, PlacedBy, StockInfo};

    fn product(id: &str, quantity: u32, threshold: u32) -> Product {
        Product {
            product_id: ProductId::from(id),
            product_name: format!("Product {id}"),
            product_description: "test product".to_string(),
            image_url: String::new(),
            unit_price: Money::from_cents(1000),
            stock_info: StockInfo::new(quantity, threshold, 10),
        }
    }

    fn order(id: &str, product_id: &str) -> Order {
        Order {
            order_id: OrderId::from(id),
            customer_id: CustomerId::from("CUS_1"),
            placed_by: PlacedBy::Customer,
            order_status: OrderStatus::Processing,
            order_date: Utc::now(),
            items: vec![common::OrderLine {
                product_id: ProductId::from(product_id),
                product_name: "Product".to_string(),
                product_description: String::new(),
                image_url: String::new(),
                unit_price: Money::from_cents(1000),
                quantity: 1,
                subtotal: Money::from_cents(1000),
                current_availability_status: Availability::Available,
            }],
            total_price: Money::from_cents(1000),
            tax: Money::from_cents(80),
            grand_total: Money::from_cents(1080),
            discount_in_percentage: None,
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let category = Category::new("Tools");
        let mut tx = store.begin().await.unwrap();
        tx.insert_category(&category).await.unwrap();
        tx.insert_product(&category.category_id, &product("PRO_a", 10, 5))
            .await
            .unwrap();
        tx.insert_product(&category.category_id, &product("PRO_b", 2, 1))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn stock_for_returns_only_known_products() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();

        let snapshots = tx
            .stock_for(&[ProductId::from("PRO_a"), ProductId::from("PRO_zzz")])
            .await
            .unwrap();

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].current_quantity, 10);
        assert_eq!(snapshots[0].stock_status, StockStatus::InStock);
    }

    #[tokio::test]
    async fn sale_decrements_and_recomputes_status() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();

        let levels = tx
            .adjust_stock(&[
                StockAdjustment::sale(ProductId::from("PRO_a"), 7),
                StockAdjustment::sale(ProductId::from("PRO_b"), 2),
            ])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(levels[0].current_quantity, 3);
        assert_eq!(levels[0].total_sold, 7);
        assert_eq!(levels[0].stock_status, StockStatus::LowStock);
        assert_eq!(levels[1].current_quantity, 0);
        assert_eq!(levels[1].stock_status, StockStatus::OutOfStock);

        let stored = store.get_product(&ProductId::from("PRO_a")).await.unwrap();
        assert_eq!(stored.unwrap().stock_info.current_quantity, 3);
    }

    #[tokio::test]
    async fn sale_beyond_stock_is_a_conflict() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();

        let result = tx
            .adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_b"), 3)])
            .await;

        assert!(matches!(
            result,
            Err(StoreError::StockConflict {
                requested: 3,
                available: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn return_never_yields_out_of_stock() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_b"), 2)])
            .await
            .unwrap();

        let levels = tx
            .adjust_stock(&[StockAdjustment::restock_return(ProductId::from("PRO_b"), 1)])
            .await
            .unwrap();

        assert_eq!(levels[0].current_quantity, 1);
        assert_eq!(levels[0].total_sold, 1);
        assert_eq!(levels[0].stock_status, StockStatus::LowStock);
    }

    #[tokio::test]
    async fn restock_past_counter_limit_is_rejected() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(&[StockAdjustment::restock(ProductId::from("PRO_a"), u32::MAX - 10)])
            .await
            .unwrap();

        let result = tx
            .adjust_stock(&[StockAdjustment::restock(ProductId::from("PRO_a"), 1)])
            .await;
        assert!(matches!(
            result,
            Err(StoreError::QuantityOverflow {
                field: "currentQuantity",
                current: u32::MAX,
                added: 1,
                ..
            })
        ));

        let snapshots = tx.stock_for(&[ProductId::from("PRO_a")]).await.unwrap();
        assert_eq!(snapshots[0].current_quantity, u32::MAX);
    }

    #[tokio::test]
    async fn return_past_counter_limit_is_rejected() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(&[StockAdjustment::restock(ProductId::from("PRO_b"), 4_000_000_000)])
            .await
            .unwrap();

        let result = tx
            .adjust_stock(&[StockAdjustment::restock_return(
                ProductId::from("PRO_b"),
                4_000_000_000,
            )])
            .await;
        assert!(matches!(result, Err(StoreError::QuantityOverflow { .. })));
    }

    #[tokio::test]
    async fn adjusting_unknown_product_fails() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();

        let result = tx
            .adjust_stock(&[StockAdjustment::restock(ProductId::from("PRO_gone"), 5)])
            .await;

        assert!(matches!(result, Err(StoreError::ProductMissing(_))));
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = seeded_store().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_a"), 4)])
                .await
                .unwrap();
            tx.insert_order(&order("ORD_1", "PRO_a")).await.unwrap();
        }

        let product = store
            .get_product(&ProductId::from("PRO_a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock_info.current_quantity, 10);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn injected_fault_fails_next_order_write_only() {
        let store = seeded_store().await;
        store.fail_next_order_write();

        let mut tx = store.begin().await.unwrap();
        let result = tx.insert_order(&order("ORD_1", "PRO_a")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        tx.insert_order(&order("ORD_1", "PRO_a")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_order_is_rejected() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order("ORD_1", "PRO_a")).await.unwrap();

        let result = tx.insert_order(&order("ORD_1", "PRO_a")).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn mark_lines_unavailable_skips_settled_orders() {
        let store = seeded_store().await;
        let mut settled = order("ORD_2", "PRO_a");
        settled.order_status = OrderStatus::Completed;

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order("ORD_1", "PRO_a")).await.unwrap();
        tx.insert_order(&settled).await.unwrap();
        let touched = tx
            .mark_lines_unavailable(&ProductId::from("PRO_a"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(touched, 1);
        let open = store.get_order(&OrderId::from("ORD_1")).await.unwrap().unwrap();
        assert_eq!(
            open.items[0].current_availability_status,
            Availability::Unavailable
        );
        let done = store.get_order(&OrderId::from("ORD_2")).await.unwrap().unwrap();
        assert_eq!(
            done.items[0].current_availability_status,
            Availability::Available
        );
    }

    #[tokio::test]
    async fn list_orders_applies_filter() {
        let store = seeded_store().await;
        let mut other = order("ORD_2", "PRO_b");
        other.customer_id = CustomerId::from("CUS_2");

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order("ORD_1", "PRO_a")).await.unwrap();
        tx.insert_order(&other).await.unwrap();
        tx.commit().await.unwrap();

        let all = store.list_orders(OrderFilter::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let mine = store
            .list_orders(OrderFilter::new().customer(CustomerId::from("CUS_2")))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].order_id, OrderId::from("ORD_2"));
    }

    #[tokio::test]
    async fn remove_product_returns_removed_document() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();

        let removed = tx.remove_product(&ProductId::from("PRO_b")).await.unwrap();
        assert!(removed.is_some());
        let again = tx.remove_product(&ProductId::from("PRO_b")).await.unwrap();
        assert!(again.is_none());
        tx.commit().await.unwrap();

        assert!(
            store
                .get_product(&ProductId::from("PRO_b"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
