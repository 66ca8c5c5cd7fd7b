//! Catalog and Stock Ledger maintenance.

mod requests;
mod service;

pub use requests::{NewCategory, NewProduct, ProductDraft, RestockRequest};
pub use service::{Discontinued, InventoryService};
