use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    Availability, Category, CategoryId, CustomerId, Money, Order, OrderId, OrderLine,
    OrderStatus, PlacedBy, Product, ProductId, StockInfo, StockStatus,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    OrderFilter, Result, StockAdjustment, StockChange, StockLevel, StockSnapshot, StoreError,
    store::{Store, StoreTransaction},
};

const PRODUCT_COLUMNS: &str = "product_id, category_id, product_name, product_description, image_url, \
     unit_price, current_quantity, total_sold, restock_threshold, restock_quantity, stock_status, \
     last_restock";

const ORDER_COLUMNS: &str = "order_id, customer_id, placed_by, order_status, order_date, items, \
     total_price, tax, grand_total, discount_in_percentage";

const LEVEL_COLUMNS: &str = "product_id, current_quantity, total_sold, stock_status";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn quantity(row: &PgRow, column: &str) -> Result<u32> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {raw}")))
}

fn stock_status(row: &PgRow) -> Result<StockStatus> {
    let label: String = row.try_get("stock_status")?;
    StockStatus::from_label(&label)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown stock status: {label}")))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        product_id: ProductId::from(row.try_get::<String, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        product_description: row.try_get("product_description")?,
        image_url: row.try_get("image_url")?,
        unit_price: Money::new(row.try_get::<Decimal, _>("unit_price")?),
        stock_info: StockInfo {
            current_quantity: quantity(row, "current_quantity")?,
            total_sold: quantity(row, "total_sold")?,
            restock_threshold: quantity(row, "restock_threshold")?,
            restock_quantity: quantity(row, "restock_quantity")?,
            stock_status: stock_status(row)?,
            last_restock: row.try_get("last_restock")?,
        },
    })
}

fn row_to_level(row: &PgRow) -> Result<StockLevel> {
    Ok(StockLevel {
        product_id: ProductId::from(row.try_get::<String, _>("product_id")?),
        current_quantity: quantity(row, "current_quantity")?,
        total_sold: quantity(row, "total_sold")?,
        stock_status: stock_status(row)?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("order_status")?;
    let items: serde_json::Value = row.try_get("items")?;

    Ok(Order {
        order_id: OrderId::from(row.try_get::<String, _>("order_id")?),
        customer_id: CustomerId::from(row.try_get::<String, _>("customer_id")?),
        placed_by: PlacedBy::from(row.try_get::<String, _>("placed_by")?),
        order_status: OrderStatus::from_label(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown order status: {status}")))?,
        order_date: row.try_get("order_date")?,
        items: serde_json::from_value::<Vec<OrderLine>>(items)?,
        total_price: Money::new(row.try_get("total_price")?),
        tax: Money::new(row.try_get("tax")?),
        grand_total: Money::new(row.try_get("grand_total")?),
        discount_in_percentage: row.try_get("discount_in_percentage")?,
    })
}

fn map_insert_error(err: sqlx::Error, entity: &'static str, id: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Duplicate {
            entity,
            id: id.to_string(),
        };
    }
    StoreError::Database(err)
}

fn group_products(rows: Vec<PgRow>) -> Result<HashMap<String, Vec<Product>>> {
    let mut grouped: HashMap<String, Vec<Product>> = HashMap::new();
    for row in rows {
        let category_id: String = row.try_get("category_id")?;
        grouped
            .entry(category_id)
            .or_default()
            .push(row_to_product(&row)?);
    }
    Ok(grouped)
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if filter.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_status = ${param_count}"));
        }
        sql.push_str(" ORDER BY order_date DESC, order_id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(ref customer_id) = filter.customer_id {
            query = query.bind(customer_id.as_str());
        }
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn get_category(&self, category_id: &CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(
            "SELECT category_id, category_name FROM categories WHERE category_id = $1",
        )
        .bind(category_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let product_rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = $1 ORDER BY position ASC"
        ))
        .bind(category_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Category {
            category_id: category_id.clone(),
            category_name: row.try_get("category_name")?,
            products: product_rows
                .iter()
                .map(row_to_product)
                .collect::<Result<_>>()?,
        }))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let category_rows = sqlx::query(
            "SELECT category_id, category_name FROM categories ORDER BY created_at ASC, category_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let product_rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY position ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        let mut grouped = group_products(product_rows)?;

        category_rows
            .into_iter()
            .map(|row| {
                let category_id: String = row.try_get("category_id")?;
                Ok(Category {
                    products: grouped.remove(&category_id).unwrap_or_default(),
                    category_id: CategoryId::from(category_id),
                    category_name: row.try_get("category_name")?,
                })
            })
            .collect()
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }
}

/// Transaction backed by a pooled PostgreSQL connection.
///
/// `sqlx` rolls the transaction back when it is dropped uncommitted.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn apply_change(&mut self, adjustment: &StockAdjustment) -> Result<Option<PgRow>> {
        let n = i64::from(adjustment.change.quantity());
        let sql = match adjustment.change {
            // Conditional decrement: zero rows affected means the stock ran out
            StockChange::Sale(_) => format!(
                r#"
                UPDATE products SET
                    current_quantity = current_quantity - $2,
                    total_sold = total_sold + $2,
                    stock_status = CASE
                        WHEN current_quantity - $2 = 0 THEN 'Out of Stock'
                        WHEN current_quantity - $2 <= restock_threshold THEN 'Low Stock'
                        ELSE 'In Stock'
                    END
                WHERE product_id = $1 AND current_quantity >= $2 AND total_sold + $2 <= $3
                RETURNING {LEVEL_COLUMNS}
                "#
            ),
            StockChange::Return(_) => format!(
                r#"
                UPDATE products SET
                    current_quantity = current_quantity + $2,
                    total_sold = GREATEST(total_sold - $2, 0),
                    stock_status = CASE
                        WHEN current_quantity + $2 > restock_threshold THEN 'In Stock'
                        ELSE 'Low Stock'
                    END
                WHERE product_id = $1 AND current_quantity + $2 <= $3
                RETURNING {LEVEL_COLUMNS}
                "#
            ),
            StockChange::Restock(_) => format!(
                r#"
                UPDATE products SET
                    current_quantity = current_quantity + $2,
                    last_restock = NOW(),
                    stock_status = CASE
                        WHEN current_quantity + $2 = 0 THEN 'Out of Stock'
                        WHEN current_quantity + $2 <= restock_threshold THEN 'Low Stock'
                        ELSE 'In Stock'
                    END
                WHERE product_id = $1 AND current_quantity + $2 <= $3
                RETURNING {LEVEL_COLUMNS}
                "#
            ),
        };

        let row = sqlx::query(&sql)
            .bind(adjustment.product_id.as_str())
            .bind(n)
            .bind(i64::from(u32::MAX))
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    /// Explains why a guarded update matched no row.
    async fn rejection(&mut self, adjustment: &StockAdjustment) -> Result<StoreError> {
        let product_id = adjustment.product_id.clone();
        let requested = adjustment.change.quantity();
        let row = sqlx::query("SELECT current_quantity, total_sold FROM products WHERE product_id = $1")
            .bind(adjustment.product_id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        let Some(row) = row else {
            return Ok(StoreError::ProductMissing(product_id));
        };

        let available = quantity(&row, "current_quantity")?;
        let total_sold = quantity(&row, "total_sold")?;
        Ok(match adjustment.change {
            StockChange::Sale(_) if available < requested => StoreError::StockConflict {
                product_id,
                requested,
                available,
            },
            StockChange::Sale(_) => StoreError::QuantityOverflow {
                product_id,
                field: "totalSold",
                current: total_sold,
                added: requested,
            },
            StockChange::Return(_) | StockChange::Restock(_) => StoreError::QuantityOverflow {
                product_id,
                field: "currentQuantity",
                current: available,
                added: requested,
            },
        })
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn stock_for(&mut self, product_ids: &[ProductId]) -> Result<Vec<StockSnapshot>> {
        let ids: Vec<String> = product_ids.iter().map(|id| id.to_string()).collect();

        // Lock in a stable order so concurrent orders over overlapping
        // product sets cannot deadlock
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ANY($1) \
             ORDER BY product_id ASC FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| row_to_product(row).map(|p| StockSnapshot::from(&p)))
            .collect()
    }

    async fn adjust_stock(&mut self, adjustments: &[StockAdjustment]) -> Result<Vec<StockLevel>> {
        let mut levels = Vec::with_capacity(adjustments.len());

        for adjustment in adjustments {
            match self.apply_change(adjustment).await? {
                Some(row) => levels.push(row_to_level(&row)?),
                None => return Err(self.rejection(adjustment).await?),
            }
        }

        tracing::debug!(count = levels.len(), "stock adjusted");
        Ok(levels)
    }

    async fn load_order(&mut self, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let items = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, customer_id, placed_by, order_status, order_date, items,
                                total_price, tax, grand_total, discount_in_percentage)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.customer_id.as_str())
        .bind(String::from(order.placed_by.clone()))
        .bind(order.order_status.as_str())
        .bind(order.order_date)
        .bind(items)
        .bind(order.total_price.amount())
        .bind(order.tax.amount())
        .bind(order.grand_total.amount())
        .bind(order.discount_in_percentage)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, "order", order.order_id.as_str()))?;

        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        let items = serde_json::to_value(&order.items)?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                order_status = $2,
                items = $3,
                total_price = $4,
                tax = $5,
                grand_total = $6,
                discount_in_percentage = $7
            WHERE order_id = $1
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.order_status.as_str())
        .bind(items)
        .bind(order.total_price.amount())
        .bind(order.tax.amount())
        .bind(order.grand_total.amount())
        .bind(order.discount_in_percentage)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderMissing(order.order_id.clone()));
        }
        Ok(())
    }

    async fn insert_category(&mut self, category: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (category_id, category_name) VALUES ($1, $2)")
            .bind(category.category_id.as_str())
            .bind(&category.category_name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_insert_error(e, "category", category.category_id.as_str()))?;
        Ok(())
    }

    async fn insert_product(&mut self, category_id: &CategoryId, product: &Product) -> Result<()> {
        let stock = &product.stock_info;

        sqlx::query(
            r#"
            INSERT INTO products (product_id, category_id, product_name, product_description,
                                  image_url, unit_price, current_quantity, total_sold,
                                  restock_threshold, restock_quantity, stock_status, last_restock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(product.product_id.as_str())
        .bind(category_id.as_str())
        .bind(&product.product_name)
        .bind(&product.product_description)
        .bind(&product.image_url)
        .bind(product.unit_price.amount())
        .bind(i64::from(stock.current_quantity))
        .bind(i64::from(stock.total_sold))
        .bind(i64::from(stock.restock_threshold))
        .bind(i64::from(stock.restock_quantity))
        .bind(stock.stock_status.as_str())
        .bind(stock.last_restock)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::CategoryMissing(category_id.clone());
            }
            map_insert_error(e, "product", product.product_id.as_str())
        })?;

        Ok(())
    }

    async fn remove_product(&mut self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "DELETE FROM products WHERE product_id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn mark_lines_unavailable(&mut self, product_id: &ProductId) -> Result<u64> {
        let containment = serde_json::json!([{ "productID": product_id.as_str() }]);

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE order_status IN ('processing', 'shipped') AND items @> $1 \
             ORDER BY order_id ASC FOR UPDATE"
        ))
        .bind(containment)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut touched = 0;
        for row in rows {
            let mut order = row_to_order(&row)?;
            for line in order
                .items
                .iter_mut()
                .filter(|l| &l.product_id == product_id)
            {
                line.current_availability_status = Availability::Unavailable;
            }

            sqlx::query("UPDATE orders SET items = $2 WHERE order_id = $1")
                .bind(order.order_id.as_str())
                .bind(serde_json::to_value(&order.items)?)
                .execute(&mut *self.tx)
                .await?;
            touched += 1;
        }

        Ok(touched)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
