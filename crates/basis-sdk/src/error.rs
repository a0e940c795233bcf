//! Error types for the Basis SDK ABI

use crate::handle::ObjHandle;

/// Result type for ABI calls
pub type AbiResult<T> = Result<T, NativeError>;

/// Errors surfaced across the native boundary.
///
/// Every failure is returned to the caller as one of these; nothing in the
/// protocol or the dispatcher aborts the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// No method with this name on the receiver's type or its ancestors
    #[error("Unknown method: {type_name}.{method}")]
    MethodNotFound {
        /// Runtime type name of the receiver
        type_name: String,
        /// Requested method name
        method: String,
    },

    /// Resolved method rejected the argument bundle
    #[error("Argument mismatch calling {method}: expected {expected}, got {got}")]
    ArgumentMismatch {
        /// Method name
        method: String,
        /// Accepted shape
        expected: String,
        /// Supplied shape
        got: String,
    },

    /// Handle does not denote a live object in this environment
    #[error("Invalid handle: {0:?}")]
    InvalidHandle(ObjHandle),

    /// Slot tag does not match the requested type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Type id not present in the registry
    #[error("Unknown type id: {0}")]
    UnknownType(usize),

    /// Object arena reached its configured limit
    #[error("Heap exhausted: limit of {limit} objects reached")]
    HeapExhausted {
        /// Configured object limit
        limit: usize,
    },

    /// Writing to the output sink failed
    #[error("I/O error: {0}")]
    Io(String),

    /// ABI operation failed
    #[error("{0}")]
    AbiError(String),
}

impl NativeError {
    /// Whether this error means "no such method" at the call site
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, NativeError::MethodNotFound { .. })
    }
}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError::AbiError(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError::AbiError(s.to_string())
    }
}

impl From<std::io::Error> for NativeError {
    fn from(e: std::io::Error) -> Self {
        NativeError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = NativeError::MethodNotFound {
            type_name: "Widget".to_string(),
            method: "spin".to_string(),
        };
        assert_eq!(e.to_string(), "Unknown method: Widget.spin");
        assert!(e.is_method_not_found());

        let e = NativeError::ArgumentMismatch {
            method: "equals".to_string(),
            expected: "1 argument".to_string(),
            got: "0 arguments".to_string(),
        };
        assert!(e.to_string().contains("equals"));
        assert!(!e.is_method_not_found());
    }

    #[test]
    fn test_from_str() {
        let e: NativeError = "boom".into();
        assert_eq!(e, NativeError::AbiError("boom".to_string()));
    }
}
