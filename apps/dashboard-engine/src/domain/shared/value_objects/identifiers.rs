//! Strongly-typed identifiers.
//!
//! These prevent mixing up client request IDs, broker IDs and session handles.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty or whitespace only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    RequestId,
    "Client-supplied idempotency key for one logical execution intent."
);
define_id!(BrokerOrderId, "Venue-assigned identifier for a submitted order.");
define_id!(SessionId, "Handle identifying one real-time subscriber.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_new_and_display() {
        let id = RequestId::new("r1");
        assert_eq!(id.as_str(), "r1");
        assert_eq!(format!("{id}"), "r1");
    }

    #[test]
    fn session_id_generate_is_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn blank_detection() {
        assert!(RequestId::new("").is_blank());
        assert!(RequestId::new("   ").is_blank());
        assert!(!RequestId::new("r1").is_blank());
    }

    #[test]
    fn serializes_transparently() {
        let id = RequestId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: RequestId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }
}
