//! Domain layer for the retail back office.
//!
//! This crate provides:
//! - The order placement, cancellation and item-removal pipelines
//! - Discount and status transitions over placed orders
//! - Pricing of order totals
//! - Inventory maintenance (categories, products, restocks, discontinuation)

pub mod caller;
pub mod error;
pub mod inventory;
pub mod order;
pub mod pricing;

pub use caller::{CallerContext, CallerRole};
pub use error::{DomainError, Result};
pub use inventory::{Discontinued, InventoryService, NewCategory, NewProduct, RestockRequest};
pub use order::{
    DiscountRequest, LineRequest, OrderService, PlaceOrderRequest, RemoveItemRequest,
    StatusRequest,
};
pub use pricing::{MONEY_TOLERANCE, OrderTotals};
