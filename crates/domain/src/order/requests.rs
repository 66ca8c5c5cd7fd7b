//! Request payloads of the order pipelines and their validation.
//!
//! Every payload rejects unknown fields. Validation runs before any
//! transaction is opened and reports the first violated constraint.

use std::collections::HashSet;
use std::str::FromStr;

use common::{CustomerId, Money, OrderStatus, ProductId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DomainError, Result};
use crate::pricing::OrderTotals;

/// One requested line of a new order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineRequest {
    #[serde(rename = "productID")]
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub subtotal: Option<Money>,
}

/// Payload of `placeOrder`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub items: Vec<LineRequest>,
    #[serde(rename = "customerID")]
    pub customer_id: Option<String>,
    #[serde(rename = "totalPrice")]
    pub total_price: Option<Money>,
    pub tax: Option<Money>,
    #[serde(rename = "grandTotal")]
    pub grand_total: Option<Money>,
    #[serde(rename = "discountInPercentage")]
    pub discount_in_percentage: Option<Value>,
}

/// A validated line, ready to be resolved against the Stock Ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub subtotal: Money,
}

/// A validated place-order request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub customer_id: CustomerId,
    pub lines: Vec<DraftLine>,
    pub discount_in_percentage: Option<Decimal>,
    pub totals: OrderTotals,
}

impl OrderDraft {
    /// Requested product IDs, in request order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id.clone()).collect()
    }
}

impl PlaceOrderRequest {
    pub fn validate(self) -> Result<OrderDraft> {
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "items",
                "at least one item is required",
            ));
        }

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(self.items.len());
        let mut running_total = Money::zero();
        for (index, item) in self.items.into_iter().enumerate() {
            let line = item.validate(index)?;
            if !seen.insert(line.product_id.clone()) {
                return Err(DomainError::validation(
                    format!("items[{index}].productID"),
                    format!("product {} is listed more than once", line.product_id),
                ));
            }
            running_total = running_total.checked_add(line.subtotal).ok_or_else(|| {
                DomainError::validation(format!("items[{index}].subtotal"), "is too large")
            })?;
            lines.push(line);
        }

        let customer_id = self
            .customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(CustomerId::from)
            .ok_or_else(|| DomainError::validation("customerID", "is required"))?;

        let total_price = required_amount("totalPrice", self.total_price)?;
        let tax = required_amount("tax", self.tax)?;
        let grand_total = required_amount("grandTotal", self.grand_total)?;

        let discount_in_percentage = self
            .discount_in_percentage
            .as_ref()
            .map(|raw| parse_percentage("discountInPercentage", raw))
            .transpose()?;
        // A full discount would zero the required totalPrice
        if discount_in_percentage == Some(Decimal::ONE_HUNDRED) {
            return Err(DomainError::validation(
                "discountInPercentage",
                "must be below 100 when placing an order",
            ));
        }

        let totals =
            OrderTotals::from_subtotals(lines.iter().map(|l| l.subtotal), discount_in_percentage)
                .ok_or_else(|| DomainError::validation("items", "order amounts are too large"))?;
        if let Some((field, expected)) = totals.first_mismatch(total_price, tax, grand_total) {
            return Err(DomainError::validation(
                field,
                format!("does not match the order items (expected {expected})"),
            ));
        }

        Ok(OrderDraft {
            customer_id,
            lines,
            discount_in_percentage,
            totals,
        })
    }
}

impl LineRequest {
    fn validate(self, index: usize) -> Result<DraftLine> {
        let field = |name: &str| format!("items[{index}].{name}");

        let product_id = self
            .product_id
            .as_deref()
            .and_then(|raw| ProductId::parse(raw).ok())
            .ok_or_else(|| DomainError::validation(field("productID"), "is required"))?;

        let quantity = self
            .quantity
            .ok_or_else(|| DomainError::validation(field("quantity"), "is required"))?;
        if quantity <= 0 {
            return Err(DomainError::validation(
                field("quantity"),
                "must be greater than 0",
            ));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| DomainError::validation(field("quantity"), "is too large"))?;

        let subtotal = self
            .subtotal
            .ok_or_else(|| DomainError::validation(field("subtotal"), "is required"))?;
        if !subtotal.is_positive() {
            return Err(DomainError::validation(
                field("subtotal"),
                "must be greater than 0",
            ));
        }

        Ok(DraftLine {
            product_id,
            quantity,
            subtotal,
        })
    }
}

/// Payload of `removeItem`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveItemRequest {
    #[serde(rename = "productId", alias = "productID")]
    pub product_id: Option<String>,
}

impl RemoveItemRequest {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: Some(product_id.into()),
        }
    }

    pub fn validate(self) -> Result<ProductId> {
        self.product_id
            .as_deref()
            .and_then(|raw| ProductId::parse(raw).ok())
            .ok_or_else(|| DomainError::validation("productId", "is required"))
    }
}

/// Payload of `addDiscount`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscountRequest {
    #[serde(rename = "discountInPercentage")]
    pub discount_in_percentage: Option<Value>,
}

impl DiscountRequest {
    pub fn new(pct: Decimal) -> Self {
        Self {
            discount_in_percentage: Some(Value::String(pct.to_string())),
        }
    }

    pub fn validate(self) -> Result<Decimal> {
        let raw = self
            .discount_in_percentage
            .ok_or_else(|| DomainError::validation("discountInPercentage", "is required"))?;
        parse_percentage("discountInPercentage", &raw)
    }
}

/// Payload of `changeStatus`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRequest {
    #[serde(rename = "orderStatus")]
    pub order_status: Option<String>,
}

impl StatusRequest {
    pub fn new(status: OrderStatus) -> Self {
        Self {
            order_status: Some(status.to_string()),
        }
    }

    /// Only `processing` and `shipped` can be reached through this path;
    /// completion and cancellation have dedicated operations.
    pub fn validate(self) -> Result<OrderStatus> {
        let label = self
            .order_status
            .ok_or_else(|| DomainError::validation("orderStatus", "is required"))?;
        match OrderStatus::from_label(label.trim()) {
            Some(status @ (OrderStatus::Processing | OrderStatus::Shipped)) => Ok(status),
            _ => Err(DomainError::validation(
                "orderStatus",
                format!("must be processing or shipped, got {label:?}"),
            )),
        }
    }
}

fn required_amount(field: &str, amount: Option<Money>) -> Result<Money> {
    match amount {
        Some(amount) if !amount.is_zero() => Ok(amount),
        _ => Err(DomainError::validation(field, "is required")),
    }
}

/// Accepts a JSON number or a numeric string in `(0, 100]`.
fn parse_percentage(field: &str, raw: &Value) -> Result<Decimal> {
    let parsed = match raw {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    };
    let pct = parsed.ok_or_else(|| DomainError::validation(field, "must be a number"))?;

    if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(
            field,
            "must be greater than 0 and at most 100",
        ));
    }
    Ok(pct.normalize())
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(value: Value) -> PlaceOrderRequest {
        serde_json::from_value(value).unwrap()
    }

    fn valid() -> Value {
        json!({
            "items": [{"productID": "PRO_abc", "quantity": 7, "subtotal": 70.00}],
            "customerID": "CUS_1",
            "totalPrice": 70.00,
            "tax": 5.60,
            "grandTotal": 75.60
        })
    }

    fn field_of(err: DomainError) -> String {
        match err {
            DomainError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_request() {
        let draft = request(valid()).validate().unwrap();

        assert_eq!(draft.customer_id, CustomerId::from("CUS_1"));
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].quantity, 7);
        assert_eq!(draft.totals.grand_total, Money::from_cents(7560));
        assert_eq!(draft.discount_in_percentage, None);
    }

    #[test]
    fn test_unknown_item_field_is_rejected() {
        let mut body = valid();
        body["items"][0]["unitPrice"] = json!(10);
        assert!(serde_json::from_value::<PlaceOrderRequest>(body).is_err());

        let mut body = valid();
        body["status"] = json!("shipped");
        assert!(serde_json::from_value::<PlaceOrderRequest>(body).is_err());
    }

    #[test]
    fn test_empty_items() {
        let mut body = valid();
        body["items"] = json!([]);
        assert_eq!(field_of(request(body).validate().unwrap_err()), "items");
    }

    #[test]
    fn test_line_constraints() {
        let mut body = valid();
        body["items"][0]["quantity"] = json!(0);
        assert_eq!(
            field_of(request(body).validate().unwrap_err()),
            "items[0].quantity"
        );

        let mut body = valid();
        body["items"][0]["subtotal"] = json!(-1);
        assert_eq!(
            field_of(request(body).validate().unwrap_err()),
            "items[0].subtotal"
        );

        let mut body = valid();
        body["items"][0].as_object_mut().unwrap().remove("productID");
        assert_eq!(
            field_of(request(body).validate().unwrap_err()),
            "items[0].productID"
        );
    }

    #[test]
    fn test_duplicate_products_are_rejected() {
        let body = json!({
            "items": [
                {"productID": "PRO_abc", "quantity": 1, "subtotal": 10},
                {"productID": "PRO_abc", "quantity": 2, "subtotal": 20}
            ],
            "customerID": "CUS_1",
            "totalPrice": 30,
            "tax": 2.40,
            "grandTotal": 32.40
        });
        assert_eq!(
            field_of(request(body).validate().unwrap_err()),
            "items[1].productID"
        );
    }

    #[test]
    fn test_required_header_fields() {
        for field in ["customerID", "totalPrice", "tax", "grandTotal"] {
            let mut body = valid();
            body.as_object_mut().unwrap().remove(field);
            assert_eq!(field_of(request(body).validate().unwrap_err()), field);
        }

        let mut body = valid();
        body["customerID"] = json!("   ");
        assert_eq!(field_of(request(body).validate().unwrap_err()), "customerID");

        let mut body = valid();
        body["tax"] = json!(0);
        assert_eq!(field_of(request(body).validate().unwrap_err()), "tax");
    }

    #[test]
    fn test_client_totals_are_cross_checked() {
        let mut body = valid();
        body["grandTotal"] = json!(80.00);
        assert_eq!(field_of(request(body).validate().unwrap_err()), "grandTotal");
    }

    #[test]
    fn test_discount_as_number_or_string() {
        let mut body = valid();
        body["discountInPercentage"] = json!("10");
        body["totalPrice"] = json!(63.00);
        body["grandTotal"] = json!(68.60);
        let draft = request(body).validate().unwrap();
        assert_eq!(draft.discount_in_percentage, Some(Decimal::new(10, 0)));
        assert_eq!(draft.totals.total_price, Money::from_cents(6300));

        let mut body = valid();
        body["discountInPercentage"] = json!(10);
        body["totalPrice"] = json!(63.00);
        body["grandTotal"] = json!(68.60);
        assert!(request(body).validate().is_ok());

        let mut body = valid();
        body["discountInPercentage"] = json!("ten");
        assert_eq!(
            field_of(request(body).validate().unwrap_err()),
            "discountInPercentage"
        );
    }

    #[test]
    fn test_discount_range() {
        for pct in [json!(0), json!(-5), json!(100.5), json!(true)] {
            let req = DiscountRequest {
                discount_in_percentage: Some(pct),
            };
            assert!(req.validate().is_err());
        }
        let req = DiscountRequest {
            discount_in_percentage: Some(json!(100)),
        };
        assert_eq!(req.validate().unwrap(), Decimal::ONE_HUNDRED);
        assert!(DiscountRequest::default().validate().is_err());
    }

    #[test]
    fn test_full_discount_is_rejected_at_placement() {
        let mut body = valid();
        body["discountInPercentage"] = json!(100);
        body["totalPrice"] = json!(0.01);
        body["grandTotal"] = json!(5.61);
        assert_eq!(
            field_of(request(body).validate().unwrap_err()),
            "discountInPercentage"
        );
    }

    #[test]
    fn test_oversized_subtotals_are_rejected() {
        let mut body = valid();
        body["items"] = json!([
            {"productID": "PRO_a", "quantity": 1, "subtotal": 7e28},
            {"productID": "PRO_b", "quantity": 1, "subtotal": 7e28}
        ]);
        assert_eq!(
            field_of(request(body).validate().unwrap_err()),
            "items[1].subtotal"
        );

        let mut body = valid();
        body["items"] = json!([{"productID": "PRO_a", "quantity": 1, "subtotal": 7.5e28}]);
        assert_eq!(field_of(request(body).validate().unwrap_err()), "items");
    }

    #[test]
    fn test_status_request_accepts_open_states_only() {
        assert_eq!(
            StatusRequest::new(OrderStatus::Shipped).validate().unwrap(),
            OrderStatus::Shipped
        );
        assert!(StatusRequest::new(OrderStatus::Completed).validate().is_err());
        assert!(StatusRequest::new(OrderStatus::Cancelled).validate().is_err());
        assert!(StatusRequest::default().validate().is_err());
    }

    #[test]
    fn test_remove_item_request() {
        let req: RemoveItemRequest = serde_json::from_value(json!({"productId": "PRO_a"})).unwrap();
        assert_eq!(req.validate().unwrap(), ProductId::from("PRO_a"));

        let req: RemoveItemRequest = serde_json::from_value(json!({"productID": "PRO_a"})).unwrap();
        assert_eq!(req.validate().unwrap(), ProductId::from("PRO_a"));

        assert!(serde_json::from_value::<RemoveItemRequest>(json!({"sku": "x"})).is_err());
        assert!(RemoveItemRequest::new(" ").validate().is_err());
    }
}
