//! Order Record documents and the order status state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CustomerId, EmployeeId, Money, OrderId, ProductId};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// processing ◄──► shipped ──► completed
///     │              │
///     └──────────────┴──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order accepted, stock allocated.
    #[default]
    Processing,

    /// Order handed to the carrier.
    Shipped,

    /// Order delivered (terminal state).
    Completed,

    /// Order cancelled and stock returned (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no further mutation possible).
    pub fn is_settled(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns true if the order can be completed in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns true if `next` is reachable from this state in one step.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Processing)
                | (OrderStatus::Shipped, OrderStatus::Completed)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Cancelled)
        )
    }

    /// Returns the stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the product behind an order line can still be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    /// `Unavailable` iff the sale emptied the product's stock.
    pub fn after_sale(remaining_quantity: u32) -> Self {
        if remaining_quantity == 0 {
            Availability::Unavailable
        } else {
            Availability::Available
        }
    }
}

/// Who placed an order: the customer themselves, or an employee on their behalf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlacedBy {
    Customer,
    Employee(EmployeeId),
}

impl PlacedBy {
    /// Stored marker for customer-placed orders.
    pub const CUSTOMER_MARKER: &'static str = "customer";
}

impl From<String> for PlacedBy {
    fn from(raw: String) -> Self {
        if raw == Self::CUSTOMER_MARKER {
            PlacedBy::Customer
        } else {
            PlacedBy::Employee(EmployeeId::from(raw))
        }
    }
}

impl From<PlacedBy> for String {
    fn from(placed_by: PlacedBy) -> Self {
        match placed_by {
            PlacedBy::Customer => PlacedBy::CUSTOMER_MARKER.to_string(),
            PlacedBy::Employee(id) => id.to_string(),
        }
    }
}

/// Denormalized order line: a snapshot of the product taken at purchase time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(rename = "productID")]
    pub product_id: ProductId,
    #[serde(rename = "productName")]
    pub product_name: String,
    #[serde(rename = "productDescription")]
    pub product_description: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "unitPrice")]
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
    #[serde(rename = "currentAvailabilityStatus")]
    pub current_availability_status: Availability,
}

/// An order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
    #[serde(rename = "customerID")]
    pub customer_id: CustomerId,
    #[serde(rename = "placedBy")]
    pub placed_by: PlacedBy,
    #[serde(rename = "orderStatus")]
    pub order_status: OrderStatus,
    #[serde(rename = "orderDate")]
    pub order_date: DateTime<Utc>,
    pub items: Vec<OrderLine>,
    #[serde(rename = "totalPrice")]
    pub total_price: Money,
    pub tax: Money,
    #[serde(rename = "grandTotal")]
    pub grand_total: Money,
    #[serde(
        rename = "discountInPercentage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub discount_in_percentage: Option<Decimal>,
}

impl Order {
    /// Returns the line for a product.
    pub fn line(&self, product_id: &ProductId) -> Option<&OrderLine> {
        self.items.iter().find(|l| &l.product_id == product_id)
    }

    /// Returns true if the order is completed or cancelled.
    pub fn is_settled(&self) -> bool {
        self.order_status.is_settled()
    }
}
