//! Default constants and built-in type layout.
//!
//! The built-in types are registered in this order by every
//! `TypeRegistry`, so their ids are fixed.

use basis_sdk::TypeId;

/// Root type every managed object inherits from.
pub const OBJ_TYPE_ID: TypeId = 0;
/// Managed string type.
pub const STR_TYPE_ID: TypeId = 1;
/// Managed list type.
pub const LIST_TYPE_ID: TypeId = 2;
/// Reflective type-object type.
pub const TYPE_TYPE_ID: TypeId = 3;

/// Name of the root type.
pub const OBJ_TYPE_NAME: &str = "Obj";
/// Name of the string type.
pub const STR_TYPE_NAME: &str = "Str";
/// Name of the list type.
pub const LIST_TYPE_NAME: &str = "List";
/// Name of the type-object type.
pub const TYPE_TYPE_NAME: &str = "Type";

/// Default number of arena slots reserved up front.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;
