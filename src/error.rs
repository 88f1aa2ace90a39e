//! Error types for astron-db-client.

use std::fmt;

use thiserror::Error;

/// How a field was referenced when it could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// Referenced by name from a request.
    Name(String),
    /// Referenced by number from a server reply.
    Number(u16),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Name(name) => write!(f, "{:?}", name),
            FieldKey::Number(number) => write!(f, "#{}", number),
        }
    }
}

/// Main error type for all database client operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// I/O error on the message director connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading a schema description.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field name or number is not defined by the DClass.
    #[error("DClass {dclass} has no field {field}")]
    UnknownField { dclass: String, field: FieldKey },

    /// A reply referenced a DClass ID the registry does not know.
    #[error("Unknown DClass ID: {0}")]
    UnknownClass(u16),

    /// Compare-and-swap update with differing new/old key sets.
    #[error("Field sets differ: new {new:?}, old {old:?}")]
    KeyMismatch { new: Vec<String>, old: Vec<String> },

    /// Query by field names without a DClass to translate them.
    #[error("Querying by field name requires a DClass")]
    SchemaRequired,

    /// A value does not conform to the field's parameter type.
    #[error("Type mismatch for {field}: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// A reply body is truncated or malformed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A reply arrived for a context that is not in flight.
    #[error("Stale context: {0}")]
    StaleContext(u32),

    /// Framing violation on the message director stream.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid schema description.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The outbound datagram queue is full.
    #[error("Outbound queue full")]
    QueueFull,
}

impl DbError {
    pub(crate) fn truncated(what: &str, needed: usize, remaining: usize) -> Self {
        DbError::Decode(format!(
            "truncated {}: need {} bytes, {} remaining",
            what, needed, remaining
        ))
    }
}

/// Result type alias using DbError.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_key_display() {
        assert_eq!(FieldKey::Name("setName".into()).to_string(), "\"setName\"");
        assert_eq!(FieldKey::Number(65535).to_string(), "#65535");
    }

    #[test]
    fn test_unknown_field_message() {
        let err = DbError::UnknownField {
            dclass: "Avatar".into(),
            field: FieldKey::Number(7),
        };
        assert_eq!(err.to_string(), "DClass Avatar has no field #7");
    }

    #[test]
    fn test_truncated_message() {
        let err = DbError::truncated("uint32", 4, 1);
        assert!(err.to_string().contains("need 4 bytes, 1 remaining"));
    }
}
