//! Order pipelines and their request payloads.

mod requests;
mod service;

pub use requests::{
    DiscountRequest, DraftLine, LineRequest, OrderDraft, PlaceOrderRequest, RemoveItemRequest,
    StatusRequest,
};
pub use service::OrderService;
