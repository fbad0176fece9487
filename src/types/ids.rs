//! Strongly-typed identifiers.
//!
//! All IDs are validated at construction time and implement common traits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, Serialize, Deserialize.
/// Optionally generates `new()` (UUID v4) and `Default` if `uuid` flag is passed.
macro_rules! define_id {
    ($name:ident, uuid) => {
        define_id!($name);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Application identifier as the platform reports it (e.g. "org.example.clock").
define_id!(AppId);
// Receipt for one registered event handler.
define_id!(SubscriptionToken, uuid);

impl TryFrom<&str> for AppId {
    type Error = crate::types::Error;

    fn try_from(value: &str) -> crate::types::Result<Self> {
        Self::from_string(value.to_string()).map_err(crate::types::Error::invalid_parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_id_rejects_empty() {
        assert!(AppId::from_string(String::new()).is_err());
        assert!(AppId::try_from("").is_err());
    }

    #[test]
    fn test_app_id_round_trips_str() {
        let id = AppId::try_from("org.example.clock").unwrap();
        assert_eq!(id.as_str(), "org.example.clock");
        assert_eq!(id.to_string(), "org.example.clock");
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(SubscriptionToken::new(), SubscriptionToken::new());
    }
}
