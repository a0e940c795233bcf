//! Environment trait: abstract VM operations
//!
//! Defines the interface the VM core implements. The base-object protocol
//! and the trap dispatcher program against this trait without depending on
//! heap layout or the interpreter.

use crate::error::AbiResult;
use crate::handle::ObjHandle;
use crate::types::{TypeDescriptor, TypeId};
use crate::value::ValueSlot;

/// Execution context capability for native code.
///
/// This trait is the single entry point for all native → managed operations.
/// Handles passed to it must have been issued by the same environment;
/// implementations reject anything else with `NativeError::InvalidHandle`.
pub trait Environment {
    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Resolve `method_name` on the runtime type of `argv[0]` and invoke it.
    ///
    /// `argv[0]` is the receiver; the remaining slots are the arguments.
    /// Fails with `MethodNotFound` when no method of that name exists on the
    /// receiver's type or its ancestors, and with `ArgumentMismatch` when the
    /// resolved method's signature rejects the arguments.
    fn call_by_name(&self, method_name: &str, argv: &[ValueSlot]) -> AbiResult<ValueSlot>;

    /// Whether a name-based trap forwards arguments beyond the receiver.
    ///
    /// Environments that only support receiver-only traps return false, and
    /// the dispatcher then rejects a non-empty argument bundle.
    fn trap_forwards_arguments(&self) -> bool {
        true
    }

    // ========================================================================
    // Handles and identity
    // ========================================================================

    /// Check that `handle` denotes a live object in this environment
    fn validate(&self, handle: ObjHandle) -> AbiResult<()>;

    /// Stable synthetic identity of the object (creation order)
    fn object_id(&self, handle: ObjHandle) -> AbiResult<u64>;

    // ========================================================================
    // Type metadata
    // ========================================================================

    /// Runtime type of the object
    fn type_of(&self, handle: ObjHandle) -> AbiResult<TypeDescriptor>;

    /// Reflective type object for a type (the same handle on every call)
    fn type_object(&self, type_id: TypeId) -> AbiResult<ObjHandle>;

    // ========================================================================
    // Strings and lists
    // ========================================================================

    /// Allocate a managed string from UTF-8 text
    fn create_string(&self, s: &str) -> AbiResult<ObjHandle>;

    /// Read the text of a managed string
    fn read_string(&self, val: ValueSlot) -> AbiResult<String>;

    /// Allocate a managed list
    fn create_list(&self, items: &[ValueSlot]) -> AbiResult<ObjHandle>;

    /// Read the elements of a managed list
    fn read_list(&self, val: ValueSlot) -> AbiResult<Vec<ValueSlot>>;

    // ========================================================================
    // Object state
    // ========================================================================

    /// Get instance field by index
    fn get_field(&self, handle: ObjHandle, index: usize) -> AbiResult<ValueSlot>;

    /// Set instance field by index
    fn set_field(&self, handle: ObjHandle, index: usize, value: ValueSlot) -> AbiResult<()>;

    /// Whether the object has been frozen
    fn is_frozen(&self, handle: ObjHandle) -> AbiResult<bool>;

    /// Freeze the object; later `set_field` calls fail
    fn freeze(&self, handle: ObjHandle) -> AbiResult<()>;

    // ========================================================================
    // Output
    // ========================================================================

    /// Write one line to the standard output sink and flush it
    fn write_stdout(&self, line: &str) -> AbiResult<()>;
}
