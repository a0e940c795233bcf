//! Dynamic trap dispatcher
//!
//! `trap` is the single chokepoint for calls resolved only by name: the
//! interpreter hands it a receiver, a method name and an argument bundle,
//! and it forwards them to [`Environment::call_by_name`] with the receiver
//! in `argv[0]`. It holds no state, so it can be reentered from inside the
//! method it dispatched.

use basis_sdk::{describe_args, AbiResult, Environment, NativeError, ObjHandle, ValueSlot};
use tracing::trace;

use crate::config::TrapArgPolicy;

/// Invoke `method_name` on `this` with the default argument policy.
///
/// Equivalent to [`trap_with_policy`] with [`TrapArgPolicy::Forward`].
pub fn trap(
    env: &dyn Environment,
    this: ObjHandle,
    method_name: &str,
    args: Option<&[ValueSlot]>,
) -> AbiResult<ValueSlot> {
    trap_with_policy(env, TrapArgPolicy::Forward, this, method_name, args)
}

/// Invoke `method_name` on `this`, treating extra arguments per `policy`.
///
/// Errors:
/// - `InvalidHandle` if `this` or any handle argument is not live
/// - `MethodNotFound` if the name is empty or not defined on the receiver's
///   type or any ancestor
/// - `ArgumentMismatch` if the resolved method rejects the bundle, or if
///   `policy` is `ReceiverOnly` and the bundle is not empty
pub fn trap_with_policy(
    env: &dyn Environment,
    policy: TrapArgPolicy,
    this: ObjHandle,
    method_name: &str,
    args: Option<&[ValueSlot]>,
) -> AbiResult<ValueSlot> {
    env.validate(this)?;
    let args = args.unwrap_or(&[]);

    if method_name.is_empty() {
        let ty = env.type_of(this)?;
        return Err(NativeError::MethodNotFound {
            type_name: ty.name,
            method: String::new(),
        });
    }

    for arg in args {
        if let Some(h) = arg.as_handle() {
            env.validate(h)?;
        }
    }

    if policy == TrapArgPolicy::ReceiverOnly && !args.is_empty() {
        return Err(NativeError::ArgumentMismatch {
            method: method_name.to_string(),
            expected: "receiver only".to_string(),
            got: describe_args(args),
        });
    }

    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(ValueSlot::handle(this));
    argv.extend_from_slice(args);

    trace!(method = method_name, receiver = ?this, argc = args.len(), "trap");
    env.call_by_name(method_name, &argv)
}

/// Managed-level entry point: `Obj.trap(Str name, List? args)`.
///
/// Reads the method name from a managed string and the arguments from an
/// optional managed list (null means no arguments), then dispatches.
pub fn trap_dynamic(
    env: &dyn Environment,
    this: ObjHandle,
    name: ValueSlot,
    args: ValueSlot,
) -> AbiResult<ValueSlot> {
    let method_name = env.read_string(name)?;
    let args = if args.is_null() {
        None
    } else {
        Some(env.read_list(args)?)
    };
    trap_with_policy(
        env,
        env_policy(env),
        this,
        &method_name,
        args.as_deref(),
    )
}

fn env_policy(env: &dyn Environment) -> TrapArgPolicy {
    if env.trap_forwards_arguments() {
        TrapArgPolicy::Forward
    } else {
        TrapArgPolicy::ReceiverOnly
    }
}
