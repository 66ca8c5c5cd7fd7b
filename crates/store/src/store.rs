use async_trait::async_trait;
use common::{
    Category, CategoryId, CustomerId, Money, Order, OrderId, OrderStatus, Product, ProductId,
    StockStatus,
};

use crate::Result;

/// Projection of the product fields the order pipelines need.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_description: String,
    pub image_url: String,
    pub unit_price: Money,
    pub current_quantity: u32,
    pub restock_threshold: u32,
    pub restock_quantity: u32,
    pub total_sold: u32,
    pub stock_status: StockStatus,
}

impl From<&Product> for StockSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.product_id.clone(),
            product_name: product.product_name.clone(),
            product_description: product.product_description.clone(),
            image_url: product.image_url.clone(),
            unit_price: product.unit_price,
            current_quantity: product.stock_info.current_quantity,
            restock_threshold: product.stock_info.restock_threshold,
            restock_quantity: product.stock_info.restock_quantity,
            total_sold: product.stock_info.total_sold,
            stock_status: product.stock_info.stock_status,
        }
    }
}

/// How a stock adjustment moves a product's figures.
///
/// Each variant carries the status rule applied to the post-update quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// Units sold: conditional decrement (`current ≥ n`), `totalSold += n`,
    /// tri-state status.
    Sale(u32),
    /// Sold units returned: increment, `totalSold -= n` (floored at zero),
    /// two-state status.
    Return(u32),
    /// Supplier restock: increment, `lastRestock = now`, tri-state status.
    Restock(u32),
}

impl StockChange {
    /// Returns the number of units moved.
    pub fn quantity(&self) -> u32 {
        match self {
            StockChange::Sale(n) | StockChange::Return(n) | StockChange::Restock(n) => *n,
        }
    }
}

/// One per-product update inside a bulk stock adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub change: StockChange,
}

impl StockAdjustment {
    pub fn sale(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            change: StockChange::Sale(quantity),
        }
    }

    pub fn restock_return(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            change: StockChange::Return(quantity),
        }
    }

    pub fn restock(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            change: StockChange::Restock(quantity),
        }
    }
}

/// Stock figures of a product after an adjustment landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub current_quantity: u32,
    pub total_sold: u32,
    pub stock_status: StockStatus,
}

/// Filter for listing orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    /// Creates an empty filter matching all orders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to orders of a customer.
    pub fn customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Restricts to orders in a status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns true if the order passes the filter.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(ref customer_id) = self.customer_id
            && &order.customer_id != customer_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.order_status != status
        {
            return false;
        }
        true
    }
}

/// Core trait for store implementations.
///
/// All durable state (Stock Ledger and Order Records) lives behind this trait.
/// Writes only happen through a [`StoreTransaction`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction scope.
    ///
    /// Dropping the returned transaction without calling
    /// [`StoreTransaction::commit`] discards every buffered write.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Retrieves an order by ID.
    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Retrieves orders matching a filter, newest first.
    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;

    /// Retrieves a category with its products in listing order.
    async fn get_category(&self, category_id: &CategoryId) -> Result<Option<Category>>;

    /// Retrieves all categories.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Retrieves a single product.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>>;
}

/// A unit of work spanning the Stock Ledger and the Order Records.
///
/// Either every write performed through the transaction lands on `commit`,
/// or none of them does.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Fetches the stock snapshot of exactly the given products.
    ///
    /// Unknown IDs are absent from the result.
    async fn stock_for(&mut self, product_ids: &[ProductId]) -> Result<Vec<StockSnapshot>>;

    /// Applies one update per product.
    ///
    /// A `Sale` that would take the quantity below zero fails with
    /// `StockConflict`; an unknown product fails with `ProductMissing`.
    async fn adjust_stock(&mut self, adjustments: &[StockAdjustment]) -> Result<Vec<StockLevel>>;

    /// Loads an order and holds it for the rest of the transaction.
    async fn load_order(&mut self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Inserts a new order.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Replaces an existing order.
    async fn save_order(&mut self, order: &Order) -> Result<()>;

    /// Inserts a new, empty category.
    async fn insert_category(&mut self, category: &Category) -> Result<()>;

    /// Appends a product to a category.
    async fn insert_product(&mut self, category_id: &CategoryId, product: &Product) -> Result<()>;

    /// Removes a product from the ledger, returning it if it existed.
    async fn remove_product(&mut self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Marks every line for `product_id` in non-settled orders `Unavailable`.
    ///
    /// Returns the number of orders touched.
    async fn mark_lines_unavailable(&mut self, product_id: &ProductId) -> Result<u64>;

    /// Commits every write buffered in this transaction.
    async fn commit(self: Box<Self>) -> Result<()>;
}
