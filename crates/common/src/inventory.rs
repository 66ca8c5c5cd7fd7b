//! Stock Ledger documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CategoryId, Money, ProductId};

/// Availability classification of a product's stock.
///
/// Always derived from `currentQuantity` and `restockThreshold`, never set
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "In Stock")]
    InStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    /// Tri-state rule used when stock is sold, created or restocked.
    ///
    /// `0 → Out of Stock`, `1..=threshold → Low Stock`, otherwise `In Stock`.
    pub fn for_quantity(current_quantity: u32, restock_threshold: u32) -> Self {
        if current_quantity == 0 {
            StockStatus::OutOfStock
        } else if current_quantity <= restock_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    /// Two-state rule used when sold units come back (cancellation, item removal).
    ///
    /// Quantity only grows on this path, so `Out of Stock` is never produced,
    /// even when both quantity and threshold are zero.
    pub fn after_return(current_quantity: u32, restock_threshold: u32) -> Self {
        if current_quantity > restock_threshold {
            StockStatus::InStock
        } else {
            StockStatus::LowStock
        }
    }

    /// Returns the stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }

    /// Parses a stored label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "In Stock" => Some(StockStatus::InStock),
            "Low Stock" => Some(StockStatus::LowStock),
            "Out of Stock" => Some(StockStatus::OutOfStock),
            _ => None,
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-product stock figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    pub current_quantity: u32,
    pub total_sold: u32,
    pub restock_threshold: u32,
    pub restock_quantity: u32,
    pub stock_status: StockStatus,
    pub last_restock: DateTime<Utc>,
}

impl StockInfo {
    /// Creates stock info for a newly listed product.
    pub fn new(current_quantity: u32, restock_threshold: u32, restock_quantity: u32) -> Self {
        Self {
            current_quantity,
            total_sold: 0,
            restock_threshold,
            restock_quantity,
            stock_status: StockStatus::for_quantity(current_quantity, restock_threshold),
            last_restock: Utc::now(),
        }
    }
}

/// A product listed inside a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "productID")]
    pub product_id: ProductId,
    #[serde(rename = "productName")]
    pub product_name: String,
    #[serde(rename = "productDescription", default)]
    pub product_description: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
    #[serde(rename = "unitPrice")]
    pub unit_price: Money,
    #[serde(rename = "stockInfo")]
    pub stock_info: StockInfo,
}

/// A category owning an ordered collection of products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "categoryID")]
    pub category_id: CategoryId,
    #[serde(rename = "categoryName")]
    pub category_name: String,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Category {
    /// Creates an empty category with a generated ID.
    pub fn new(category_name: impl Into<String>) -> Self {
        Self {
            category_id: CategoryId::generate(),
            category_name: category_name.into(),
            products: Vec::new(),
        }
    }

    /// Returns a product by ID.
    pub fn product(&self, product_id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.product_id == product_id)
    }
}
