//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{
    Availability, Category, CustomerId, Money, Order, OrderId, OrderLine, OrderStatus, PlacedBy,
    Product, ProductId, StockInfo, StockStatus,
};
use sqlx::PgPool;
use store::{OrderFilter, PostgresStore, StockAdjustment, Store, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_and_orders.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders, products, categories")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn product(id: &str, quantity: u32, threshold: u32) -> Product {
    Product {
        product_id: ProductId::from(id),
        product_name: format!("Product {id}"),
        product_description: "integration product".to_string(),
        image_url: format!("https://cdn.example.com/{id}.png"),
        unit_price: Money::from_cents(1000),
        stock_info: StockInfo::new(quantity, threshold, 20),
    }
}

fn order(id: &str, product_id: &str, quantity: u32) -> Order {
    Order {
        order_id: OrderId::from(id),
        customer_id: CustomerId::from("CUS_pg"),
        placed_by: PlacedBy::Customer,
        order_status: OrderStatus::Processing,
        order_date: Utc::now(),
        items: vec![OrderLine {
            product_id: ProductId::from(product_id),
            product_name: "Product".to_string(),
            product_description: String::new(),
            image_url: String::new(),
            unit_price: Money::from_cents(1000),
            quantity,
            subtotal: Money::from_cents(1000 * i64::from(quantity)),
            current_availability_status: Availability::Available,
        }],
        total_price: Money::from_cents(1000),
        tax: Money::from_cents(80),
        grand_total: Money::from_cents(1080),
        discount_in_percentage: None,
    }
}

async fn seed(store: &PostgresStore) -> Category {
    let category = Category::new("Hardware");
    let mut tx = store.begin().await.unwrap();
    tx.insert_category(&category).await.unwrap();
    tx.insert_product(&category.category_id, &product("PRO_a", 10, 5))
        .await
        .unwrap();
    tx.insert_product(&category.category_id, &product("PRO_b", 3, 1))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    category
}

#[tokio::test]
async fn catalog_roundtrip() {
    let store = get_test_store().await;
    let category = seed(&store).await;

    let loaded = store
        .get_category(&category.category_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.products.len(), 2);
    assert_eq!(loaded.products[0].product_id, ProductId::from("PRO_a"));
    assert_eq!(loaded.products[1].product_id, ProductId::from("PRO_b"));

    let all = store.list_categories().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn sale_and_order_commit_together() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    let snapshots = tx.stock_for(&[ProductId::from("PRO_a")]).await.unwrap();
    assert_eq!(snapshots[0].current_quantity, 10);

    let levels = tx
        .adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_a"), 7)])
        .await
        .unwrap();
    assert_eq!(levels[0].current_quantity, 3);
    assert_eq!(levels[0].total_sold, 7);
    assert_eq!(levels[0].stock_status, StockStatus::LowStock);

    tx.insert_order(&order("ORD_1", "PRO_a", 7)).await.unwrap();
    tx.commit().await.unwrap();

    let stored = store.get_order(&OrderId::from("ORD_1")).await.unwrap();
    assert_eq!(stored.unwrap().items[0].quantity, 7);
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let store = get_test_store().await;
    seed(&store).await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_a"), 4)])
            .await
            .unwrap();
        tx.insert_order(&order("ORD_1", "PRO_a", 4)).await.unwrap();
    }

    let product = store
        .get_product(&ProductId::from("PRO_a"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock_info.current_quantity, 10);
    assert!(
        store
            .get_order(&OrderId::from("ORD_1"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn conditional_decrement_reports_conflict() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_b"), 4)])
        .await;

    assert!(matches!(
        result,
        Err(StoreError::StockConflict {
            requested: 4,
            available: 3,
            ..
        })
    ));
}

#[tokio::test]
async fn adjusting_unknown_product_fails() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .adjust_stock(&[StockAdjustment::restock_return(
            ProductId::from("PRO_gone"),
            1,
        )])
        .await;

    assert!(matches!(result, Err(StoreError::ProductMissing(_))));
}

#[tokio::test]
async fn restock_past_counter_limit_leaves_row_readable() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.adjust_stock(&[StockAdjustment::restock(ProductId::from("PRO_a"), u32::MAX - 10)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .adjust_stock(&[StockAdjustment::restock(ProductId::from("PRO_a"), 4_000_000_000)])
        .await;
    assert!(matches!(
        result,
        Err(StoreError::QuantityOverflow {
            field: "currentQuantity",
            current: u32::MAX,
            added: 4_000_000_000,
            ..
        })
    ));
    drop(tx);

    let product = store
        .get_product(&ProductId::from("PRO_a"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock_info.current_quantity, u32::MAX);
}

#[tokio::test]
async fn return_uses_two_state_rule() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_b"), 3)])
        .await
        .unwrap();
    let levels = tx
        .adjust_stock(&[StockAdjustment::restock_return(ProductId::from("PRO_b"), 1)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(levels[0].current_quantity, 1);
    assert_eq!(levels[0].total_sold, 2);
    assert_eq!(levels[0].stock_status, StockStatus::LowStock);
}

#[tokio::test]
async fn concurrent_sales_never_oversell() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await?;
            tx.adjust_stock(&[StockAdjustment::sale(ProductId::from("PRO_b"), 1)])
                .await?;
            tx.commit().await
        }));
    }

    let results = futures_util::future::join_all(handles).await;
    let committed = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(()))))
        .count();
    assert_eq!(committed, 3);

    let product = store
        .get_product(&ProductId::from("PRO_b"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock_info.current_quantity, 0);
    assert_eq!(product.stock_info.total_sold, 3);
    assert_eq!(product.stock_info.stock_status, StockStatus::OutOfStock);
}

#[tokio::test]
async fn save_order_and_filter() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order("ORD_1", "PRO_a", 1)).await.unwrap();
    tx.insert_order(&order("ORD_2", "PRO_b", 1)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let mut loaded = tx
        .load_order(&OrderId::from("ORD_2"))
        .await
        .unwrap()
        .unwrap();
    loaded.order_status = OrderStatus::Shipped;
    loaded.discount_in_percentage = Some(rust_decimal::Decimal::new(10, 0));
    tx.save_order(&loaded).await.unwrap();
    tx.commit().await.unwrap();

    let shipped = store
        .list_orders(OrderFilter::new().status(OrderStatus::Shipped))
        .await
        .unwrap();
    assert_eq!(shipped.len(), 1);
    assert_eq!(shipped[0].order_id, OrderId::from("ORD_2"));
    assert_eq!(
        shipped[0].discount_in_percentage,
        Some(rust_decimal::Decimal::new(10, 0))
    );
}

#[tokio::test]
async fn discontinue_marks_open_lines_unavailable() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut settled = order("ORD_2", "PRO_a", 1);
    settled.order_status = OrderStatus::Cancelled;

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order("ORD_1", "PRO_a", 1)).await.unwrap();
    tx.insert_order(&settled).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let removed = tx.remove_product(&ProductId::from("PRO_a")).await.unwrap();
    assert!(removed.is_some());
    let touched = tx
        .mark_lines_unavailable(&ProductId::from("PRO_a"))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(touched, 1);
    let open = store
        .get_order(&OrderId::from("ORD_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        open.items[0].current_availability_status,
        Availability::Unavailable
    );
}
