use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Semantic prefix carried by every externally visible identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdPrefix {
    Order,
    Product,
    Category,
    Customer,
    Employee,
}

impl IdPrefix {
    /// Returns the prefix text without the separator.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Order => "ORD",
            IdPrefix::Product => "PRO",
            IdPrefix::Category => "CAT",
            IdPrefix::Customer => "CUS",
            IdPrefix::Employee => "EMP",
        }
    }

    /// Generates a fresh identifier, e.g. `ORD_3f2c...`.
    ///
    /// The suffix is the simple (hyphen-less) form of a random v4 UUID.
    pub fn generate(&self) -> String {
        format!("{}_{}", self.as_str(), Uuid::new_v4().simple())
    }
}

impl std::fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an identifier from external input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} must not be empty")]
pub struct IdError {
    pub kind: &'static str,
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generates a new identifier with this type's prefix.
            pub fn generate() -> Self {
                Self($prefix.generate())
            }

            /// Wraps an existing identifier, rejecting blank input.
            pub fn parse(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(IdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

prefixed_id!(
    /// External order identifier (`ORD_…`). Immutable once assigned.
    OrderId,
    IdPrefix::Order
);
prefixed_id!(
    /// External product identifier (`PRO_…`).
    ProductId,
    IdPrefix::Product
);
prefixed_id!(
    /// External category identifier (`CAT_…`).
    CategoryId,
    IdPrefix::Category
);
prefixed_id!(
    /// External customer identifier (`CUS_…`).
    CustomerId,
    IdPrefix::Customer
);
prefixed_id!(
    /// External employee identifier (`EMP_…`).
    EmployeeId,
    IdPrefix::Employee
);
