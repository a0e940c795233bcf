//! Type descriptors and method signatures
//!
//! These are the read-only views of the type-metadata subsystem that native
//! code sees. The registry itself lives in the runtime.

use crate::error::{AbiResult, NativeError};
use crate::value::{SlotKind, ValueSlot};

/// Index of a type in the environment's type registry
pub type TypeId = usize;

/// Information about a runtime type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Type ID in the registry
    pub type_id: TypeId,
    /// Human-readable type name
    pub name: String,
    /// Parent type ID (None for the root type)
    pub parent_id: Option<TypeId>,
    /// Number of methods declared directly on this type
    pub method_count: usize,
    /// Whether instances can be frozen with `toImmutable`
    pub freezable: bool,
}

/// Accepted argument shape of a method, excluding the receiver.
///
/// The first `required` parameters must be supplied; the rest are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    params: Vec<SlotKind>,
    required: usize,
}

impl MethodSignature {
    /// Signature taking no arguments
    pub fn none() -> Self {
        Self {
            params: Vec::new(),
            required: 0,
        }
    }

    /// Signature where every parameter is required
    pub fn exact(params: impl Into<Vec<SlotKind>>) -> Self {
        let params = params.into();
        let required = params.len();
        Self { params, required }
    }

    /// Signature with `required` leading parameters and optional trailing ones
    ///
    /// `required` is clamped to the parameter count.
    pub fn with_optional(params: impl Into<Vec<SlotKind>>, required: usize) -> Self {
        let params = params.into();
        let required = required.min(params.len());
        Self { params, required }
    }

    /// Parameter kinds
    pub fn params(&self) -> &[SlotKind] {
        &self.params
    }

    /// Number of required parameters
    pub fn required(&self) -> usize {
        self.required
    }

    /// Maximum number of parameters
    pub fn max_arity(&self) -> usize {
        self.params.len()
    }

    /// Human-readable description of the accepted shape
    pub fn describe(&self) -> String {
        let kinds: Vec<&str> = self.params.iter().map(|k| k.name()).collect();
        if self.required == self.params.len() {
            format!("({})", kinds.join(", "))
        } else {
            let (req, opt) = kinds.split_at(self.required);
            let mut parts: Vec<String> = req.iter().map(|s| s.to_string()).collect();
            parts.extend(opt.iter().map(|s| format!("{}?", s)));
            format!("({})", parts.join(", "))
        }
    }

    /// Check an argument bundle (receiver excluded) against this signature
    pub fn check(&self, method: &str, args: &[ValueSlot]) -> AbiResult<()> {
        let mismatch = || NativeError::ArgumentMismatch {
            method: method.to_string(),
            expected: self.describe(),
            got: describe_args(args),
        };

        if args.len() < self.required || args.len() > self.params.len() {
            return Err(mismatch());
        }
        for (kind, arg) in self.params.iter().zip(args) {
            if !kind.accepts(arg.kind()) {
                return Err(mismatch());
            }
        }
        Ok(())
    }
}

impl Default for MethodSignature {
    fn default() -> Self {
        Self::none()
    }
}

/// Describe the shape of an argument bundle for error messages
pub fn describe_args(args: &[ValueSlot]) -> String {
    let kinds: Vec<&str> = args.iter().map(|a| a.type_name()).collect();
    format!("({})", kinds.join(", "))
}
