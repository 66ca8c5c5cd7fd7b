//! Domain error types.

use common::{OrderId, OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Everything except `TransactionFailure` is detected before a write is
/// attempted, or aborts the transaction that was about to write.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request is malformed, incomplete or carries forbidden fields.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A referenced order, product or category does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// More units were requested than the Stock Ledger holds.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The order is in a state that forbids the action.
    #[error("Order {order_id} is {status}: cannot {action}")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// The action is understood but not allowed.
    #[error("{0}")]
    InvalidOperation(String),

    /// The store failed to carry out the transaction.
    #[error("Transaction failed: {0}")]
    TransactionFailure(StoreError),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short machine-readable label, used as a metrics dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "validation",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::InvalidState { .. } => "invalid_state",
            DomainError::InvalidOperation(_) => "invalid_operation",
            DomainError::TransactionFailure(_) => "transaction_failure",
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StockConflict {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::QuantityOverflow {
                product_id,
                current,
                added,
                ..
            } => DomainError::validation(
                "quantity",
                format!(
                    "adding {added} to {current} units of product {product_id} exceeds the stock limit of {}",
                    u32::MAX
                ),
            ),
            StoreError::ProductMissing(id) => DomainError::not_found("Product", id),
            StoreError::CategoryMissing(id) => DomainError::not_found("Category", id),
            StoreError::OrderMissing(id) => DomainError::not_found("Order", id),
            other => DomainError::TransactionFailure(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_conflict_becomes_insufficient_stock() {
        let err: DomainError = StoreError::StockConflict {
            product_id: ProductId::from("PRO_a"),
            requested: 5,
            available: 2,
        }
        .into();

        match err {
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, ProductId::from("PRO_a"));
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_quantity_overflow_is_a_validation_error() {
        let err: DomainError = StoreError::QuantityOverflow {
            product_id: ProductId::from("PRO_a"),
            field: "currentQuantity",
            current: 4_000_000_000,
            added: 4_000_000_000,
        }
        .into();

        assert_eq!(err.reason(), "validation");
        assert!(err.to_string().contains("PRO_a"));
    }

    #[test]
    fn test_infrastructure_errors_are_transaction_failures() {
        let err: DomainError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.reason(), "transaction_failure");
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = DomainError::InvalidState {
            order_id: OrderId::from("ORD_1"),
            status: OrderStatus::Cancelled,
            action: "add a discount",
        };
        assert_eq!(err.to_string(), "Order ORD_1 is cancelled: cannot add a discount");

        let err = DomainError::not_found("Product", "PRO_x");
        assert_eq!(err.to_string(), "Product not found: PRO_x");
    }
}
