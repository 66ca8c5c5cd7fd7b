use common::{CategoryId, OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional stock decrement matched no row: fewer units remain
    /// than were requested.
    #[error("Stock conflict for product {product_id}: requested {requested}, available {available}")]
    StockConflict {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// An increment would push a stock counter past what it can hold.
    #[error("Quantity overflow for product {product_id}: {field} {current} + {added} exceeds {}", u32::MAX)]
    QuantityOverflow {
        product_id: ProductId,
        field: &'static str,
        current: u32,
        added: u32,
    },

    /// A stock adjustment referenced a product that does not exist.
    #[error("Product not found: {0}")]
    ProductMissing(ProductId),

    /// A product was added to a category that does not exist.
    #[error("Category not found: {0}")]
    CategoryMissing(CategoryId),

    /// An order save targeted an order that does not exist.
    #[error("Order not found: {0}")]
    OrderMissing(OrderId),

    /// An insert collided with an existing key.
    #[error("Duplicate {entity}: {id}")]
    Duplicate { entity: &'static str, id: String },

    /// A stored value could not be mapped back into a document.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The store refused the write (connection loss, injected fault).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
