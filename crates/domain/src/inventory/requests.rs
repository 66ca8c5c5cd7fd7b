//! Request payloads of the inventory service.

use common::{Money, StockInfo};
use serde::Deserialize;

use crate::error::{DomainError, Result};

/// Payload of `createCategory`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCategory {
    #[serde(rename = "categoryName")]
    pub category_name: Option<String>,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            category_name: Some(name.into()),
        }
    }

    pub fn validate(self) -> Result<String> {
        required_text("categoryName", self.category_name)
    }
}

/// Payload of `addProduct`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewProduct {
    #[serde(rename = "productName")]
    pub product_name: Option<String>,
    #[serde(rename = "productDescription", default)]
    pub product_description: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
    #[serde(rename = "unitPrice")]
    pub unit_price: Option<Money>,
    #[serde(rename = "currentQuantity", default)]
    pub current_quantity: u32,
    #[serde(rename = "restockThreshold", default)]
    pub restock_threshold: u32,
    #[serde(rename = "restockQuantity", default)]
    pub restock_quantity: u32,
}

/// A validated product listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub product_name: String,
    pub product_description: String,
    pub image_url: String,
    pub unit_price: Money,
    pub stock_info: StockInfo,
}

impl NewProduct {
    pub fn validate(self) -> Result<ProductDraft> {
        let product_name = required_text("productName", self.product_name)?;
        let unit_price = self
            .unit_price
            .ok_or_else(|| DomainError::validation("unitPrice", "is required"))?;
        if unit_price.is_negative() {
            return Err(DomainError::validation("unitPrice", "must not be negative"));
        }

        Ok(ProductDraft {
            product_name,
            product_description: self.product_description,
            image_url: self.image_url,
            unit_price,
            stock_info: StockInfo::new(
                self.current_quantity,
                self.restock_threshold,
                self.restock_quantity,
            ),
        })
    }
}

/// Payload of `restock`. Without a quantity the product's configured
/// restock quantity is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestockRequest {
    pub quantity: Option<i64>,
}

impl RestockRequest {
    pub fn with_quantity(quantity: u32) -> Self {
        Self {
            quantity: Some(i64::from(quantity)),
        }
    }

    /// Resolves the quantity to add, falling back to `default_quantity`.
    pub fn resolve(&self, default_quantity: u32) -> Result<u32> {
        let quantity = match self.quantity {
            Some(q) if q <= 0 => {
                return Err(DomainError::validation("quantity", "must be greater than 0"));
            }
            Some(q) => u32::try_from(q)
                .map_err(|_| DomainError::validation("quantity", "is too large"))?,
            None => default_quantity,
        };
        if quantity == 0 {
            return Err(DomainError::validation(
                "quantity",
                "is required when the product has no restock quantity",
            ));
        }
        Ok(quantity)
    }
}

fn required_text(field: &str, value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::validation(field, "is required"))
}
