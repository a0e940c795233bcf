//! Basis SDK - ABI for native implementations of the object protocol
//!
//! This crate provides the types every native method programs against:
//! value slots, object handles, the `Environment` capability, method
//! signatures and the error taxonomy. It does not depend on any heap or
//! interpreter; the runtime crate supplies a concrete `Environment`.
//!
//! # Example
//!
//! ```ignore
//! use basis_sdk::{Environment, MethodSignature, NativeMethodRegistry, ValueSlot};
//!
//! let mut methods = NativeMethodRegistry::new();
//! methods.register("area", MethodSignature::none(), |env, argv| {
//!     let this = argv[0].expect_handle()?;
//!     let w = env.get_field(this, 0)?.expect_int()?;
//!     let h = env.get_field(this, 1)?.expect_int()?;
//!     ValueSlot::int(w * h)
//! });
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod handle;
pub mod handler;
pub mod types;
pub mod value;

pub use context::Environment;
pub use error::{AbiResult, NativeError};
pub use handle::ObjHandle;
pub use handler::{NativeMethod, NativeMethodFn, NativeMethodRegistry};
pub use types::{describe_args, MethodSignature, TypeDescriptor, TypeId};
pub use value::{SlotKind, ValueSlot, INT_MAX, INT_MIN};
