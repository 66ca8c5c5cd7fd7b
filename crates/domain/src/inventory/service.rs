//! Inventory service: maintains categories and the Stock Ledger.

use common::{Category, CategoryId, Product, ProductId};
use serde::Serialize;
use store::{StockAdjustment, Store};

use crate::error::{DomainError, Result};

use super::{NewCategory, NewProduct, RestockRequest};

/// Result of discontinuing a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discontinued {
    pub product: Product,
    /// Open orders whose lines were marked unavailable.
    pub affected_orders: u64,
}

/// Service for the catalog side of the Stock Ledger.
pub struct InventoryService<S: Store> {
    store: S,
}

impl<S: Store> InventoryService<S> {
    /// Creates a new inventory service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, request: NewCategory) -> Result<Category> {
        let category = Category::new(request.validate()?);

        let mut tx = self.store.begin().await?;
        tx.insert_category(&category).await?;
        tx.commit().await?;

        tracing::info!(category_id = %category.category_id, "category created");
        Ok(category)
    }

    /// Lists a new product; its status follows the tri-state rule and
    /// `totalSold` starts at zero.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(&self, category_id: &CategoryId, request: NewProduct) -> Result<Product> {
        let draft = request.validate()?;
        let product = Product {
            product_id: ProductId::generate(),
            product_name: draft.product_name,
            product_description: draft.product_description,
            image_url: draft.image_url,
            unit_price: draft.unit_price,
            stock_info: draft.stock_info,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_product(category_id, &product).await?;
        tx.commit().await?;

        tracing::info!(
            product_id = %product.product_id,
            %category_id,
            quantity = product.stock_info.current_quantity,
            "product added"
        );
        Ok(product)
    }

    /// Adds supplier stock to a product.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, product_id: &ProductId, request: RestockRequest) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let snapshot = tx
            .stock_for(std::slice::from_ref(product_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;

        let quantity = request.resolve(snapshot.restock_quantity)?;
        let levels = tx
            .adjust_stock(&[StockAdjustment::restock(product_id.clone(), quantity)])
            .await?;
        tx.commit().await?;

        metrics::counter!("stock_restocked_total").increment(u64::from(quantity));
        if let Some(level) = levels.first() {
            tracing::info!(
                %product_id,
                quantity,
                current_quantity = level.current_quantity,
                status = %level.stock_status,
                "product restocked"
            );
        }

        self.get_product(product_id).await
    }

    /// Removes a product from the ledger and marks its lines unavailable in
    /// every open order, in one transaction.
    #[tracing::instrument(skip(self))]
    pub async fn discontinue_product(&self, product_id: &ProductId) -> Result<Discontinued> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .remove_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;
        let affected_orders = tx.mark_lines_unavailable(product_id).await?;
        tx.commit().await?;

        tracing::info!(%product_id, affected_orders, "product discontinued");
        Ok(Discontinued {
            product,
            affected_orders,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", product_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_category(&self, category_id: &CategoryId) -> Result<Category> {
        self.store
            .get_category(category_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", category_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }
}
