//! Identity of whoever invokes a pipeline.

use common::{EmployeeId, PlacedBy};
use serde::{Deserialize, Serialize};

/// Role of the authenticated caller, as resolved by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerRole {
    Customer,
    Employee,
    Admin,
}

impl CallerRole {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(CallerRole::Customer),
            "employee" => Some(CallerRole::Employee),
            "admin" => Some(CallerRole::Admin),
            _ => None,
        }
    }
}

/// The caller of an operation, passed explicitly into each pipeline call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub role: CallerRole,
    pub id: String,
}

impl CallerContext {
    pub fn new(role: CallerRole, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
        }
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Self::new(CallerRole::Customer, id)
    }

    pub fn employee(id: impl Into<String>) -> Self {
        Self::new(CallerRole::Employee, id)
    }

    /// Who the order is recorded as placed by.
    ///
    /// Staff (employees and admins) are recorded by ID; customers get the
    /// shared customer marker.
    pub fn placed_by(&self) -> PlacedBy {
        match self.role {
            CallerRole::Customer => PlacedBy::Customer,
            CallerRole::Employee | CallerRole::Admin => {
                PlacedBy::Employee(EmployeeId::from(self.id.as_str()))
            }
        }
    }
}
