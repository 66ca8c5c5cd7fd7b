//! Shared types for the retail back office.
//!
//! - Prefixed external identifiers and their generator
//! - `Money` with two-decimal rounding
//! - Stock Ledger documents (categories, products, stock info)
//! - Order Record documents and the order status state machine

pub mod id;
pub mod inventory;
pub mod money;
pub mod order;

pub use id::{CategoryId, CustomerId, EmployeeId, IdError, IdPrefix, OrderId, ProductId};
pub use inventory::{Category, Product, StockInfo, StockStatus};
pub use money::{Money, TAX_RATE};
pub use order::{Availability, Order, OrderLine, OrderStatus, PlacedBy};
