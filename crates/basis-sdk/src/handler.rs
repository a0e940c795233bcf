//! Native method table (name-based dispatch)
//!
//! A type's methods are registered here by name together with the argument
//! shape they accept. Lookup is exact-match; no normalization is applied.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Environment;
use crate::error::AbiResult;
use crate::types::MethodSignature;
use crate::value::ValueSlot;

/// A native method body.
///
/// Receives the environment and the full argument vector with the receiver
/// in `argv[0]`.
pub type NativeMethodFn =
    Arc<dyn Fn(&dyn Environment, &[ValueSlot]) -> AbiResult<ValueSlot> + Send + Sync>;

/// A registered method: body plus accepted shape
#[derive(Clone)]
pub struct NativeMethod {
    /// Accepted arguments, receiver excluded
    pub signature: MethodSignature,
    /// Method body
    pub body: NativeMethodFn,
}

impl NativeMethod {
    /// Check `argv[1..]` against the signature and invoke the body
    pub fn invoke(
        &self,
        env: &dyn Environment,
        method_name: &str,
        argv: &[ValueSlot],
    ) -> AbiResult<ValueSlot> {
        let args = argv.get(1..).unwrap_or(&[]);
        self.signature.check(method_name, args)?;
        (self.body)(env, argv)
    }
}

impl std::fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMethod")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Registry of native methods indexed by name.
#[derive(Clone, Default)]
pub struct NativeMethodRegistry {
    methods: HashMap<String, NativeMethod>,
}

impl NativeMethodRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register a method by name, replacing any previous binding
    pub fn register(
        &mut self,
        name: &str,
        signature: MethodSignature,
        body: impl Fn(&dyn Environment, &[ValueSlot]) -> AbiResult<ValueSlot> + Send + Sync + 'static,
    ) {
        self.methods.insert(
            name.to_string(),
            NativeMethod {
                signature,
                body: Arc::new(body),
            },
        );
    }

    /// Get a method by name
    pub fn get(&self, name: &str) -> Option<&NativeMethod> {
        self.methods.get(name)
    }

    /// Check if a method is registered
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|s| s.as_str())
    }

    /// Get the number of registered methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl std::fmt::Debug for NativeMethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMethodRegistry")
            .field("count", &self.methods.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SlotKind;

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = NativeMethodRegistry::new();
        registry.register("area", MethodSignature::none(), |_env, _argv| {
            Ok(ValueSlot::small_int(42))
        });

        assert!(registry.contains("area"));
        assert!(!registry.contains("Area"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(
            registry.get("area").unwrap().signature,
            MethodSignature::none()
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = NativeMethodRegistry::new();
        registry.register("m", MethodSignature::none(), |_env, _argv| Ok(ValueSlot::null()));
        registry.register("m", MethodSignature::exact([SlotKind::Int]), |_env, _argv| {
            Ok(ValueSlot::null())
        });
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("m").unwrap().signature.max_arity(), 1);
    }
}
