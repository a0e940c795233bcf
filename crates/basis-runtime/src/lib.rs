//! Basis Runtime
//!
//! Native side of the universal base-object protocol:
//! - **Protocol**: identity, hashing, ordering, string form, immutability,
//!   reflection, finalization and echo (`protocol` module)
//! - **Trap**: name-based dynamic dispatch (`trap` module)
//! - **Environment**: a reference `Environment` over an object arena and a
//!   type registry (`env`, `heap`, `types` modules)
//!
//! # Example
//!
//! ```rust,ignore
//! use basis_runtime::{MethodSignature, RuntimeEnv, TypeBuilder, TypeRegistry, ValueSlot};
//!
//! let mut types = TypeRegistry::new();
//! let widget = types.register(
//!     TypeBuilder::new("Widget")
//!         .fields(2)
//!         .method("area", MethodSignature::none(), |env, argv| {
//!             let this = argv[0].expect_handle()?;
//!             let w = env.get_field(this, 0)?.expect_int()?;
//!             let h = env.get_field(this, 1)?.expect_int()?;
//!             ValueSlot::int(w * h)
//!         }),
//! )?;
//!
//! let env = RuntimeEnv::new(types);
//! let r = env.instantiate_with(widget, &[ValueSlot::small_int(3), ValueSlot::small_int(4)])?;
//! let area = env.trap(r, "area", None)?;
//! assert_eq!(area.as_int(), Some(12));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod defaults;
pub mod env;
pub mod heap;
pub mod protocol;
pub mod trap;
pub mod types;

pub use basis_sdk::{
    AbiResult, Environment, MethodSignature, NativeError, ObjHandle, SlotKind, TypeDescriptor,
    TypeId, ValueSlot,
};
pub use config::{ConfigError, RuntimeOptions, TrapArgPolicy};
pub use env::{OutputCapture, RuntimeEnv};
pub use trap::{trap, trap_dynamic, trap_with_policy};
pub use types::{RuntimeType, TypeBuilder, TypeRegistry};
