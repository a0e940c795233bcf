//! Base-object protocol
//!
//! Native fallback implementations of the methods every managed object
//! answers to. They are bound on `Obj` by [`install`], so a method call that
//! reaches `Obj` during resolution lands here unless a subtype overrides it.
//!
//! Every function validates the receiver first; with a live receiver none
//! of them fail except on allocation limits or output errors.

use std::cmp::Ordering;

use basis_sdk::{
    AbiResult, Environment, MethodSignature, NativeMethodRegistry, ObjHandle, SlotKind, TypeId,
    ValueSlot, INT_MAX,
};

use crate::trap;

/// Identity equality
pub const EQUALS: &str = "equals";
/// Identity order
pub const COMPARE: &str = "compare";
/// Identity hash
pub const HASH: &str = "hash";
/// Debug string form
pub const TO_STR: &str = "toStr";
/// Immutability query
pub const IS_IMMUTABLE: &str = "isImmutable";
/// Immutability coercion
pub const TO_IMMUTABLE: &str = "toImmutable";
/// Reflective type query
pub const TYPE_OF: &str = "typeOf";
/// Pre-reclamation hook
pub const FINALIZE: &str = "finalize";
/// Print `toStr` to stdout
pub const ECHO: &str = "echo";
/// Name-based dispatch from managed code
pub const TRAP: &str = "trap";

/// Instance methods bound on `Obj`
pub const METHOD_NAMES: [&str; 10] = [
    EQUALS,
    COMPARE,
    HASH,
    TO_STR,
    IS_IMMUTABLE,
    TO_IMMUTABLE,
    TYPE_OF,
    FINALIZE,
    ECHO,
    TRAP,
];

/// Identity equality: true iff `other` is a handle to the same object.
pub fn equals(env: &dyn Environment, this: ObjHandle, other: ValueSlot) -> AbiResult<bool> {
    env.validate(this)?;
    match other.as_handle() {
        Some(that) => {
            env.validate(that)?;
            Ok(that == this)
        }
        None => Ok(false),
    }
}

/// Identity order by creation sequence.
///
/// Arbitrary but fixed for the lifetime of both objects; not a semantic order.
pub fn compare(env: &dyn Environment, this: ObjHandle, other: ObjHandle) -> AbiResult<Ordering> {
    let a = env.object_id(this)?;
    let b = env.object_id(other)?;
    Ok(a.cmp(&b))
}

/// Identity hash, consistent with [`equals`].
///
/// Always fits an int slot: ids past the 48-bit range are folded into it.
pub fn hash(env: &dyn Environment, this: ObjHandle) -> AbiResult<i64> {
    Ok(fold_object_id(env.object_id(this)?))
}

fn fold_object_id(id: u64) -> i64 {
    (id & INT_MAX as u64) as i64
}

/// Debug rendering `"<handle>@<type-name>"`, allocated as a managed string.
pub fn to_str(env: &dyn Environment, this: ObjHandle) -> AbiResult<ObjHandle> {
    let ty = env.type_of(this)?;
    env.create_string(&format!("{}@{}", this, ty.name))
}

/// Default immutability: no object of a plain type is immutable.
pub fn is_immutable(env: &dyn Environment, this: ObjHandle) -> AbiResult<bool> {
    env.validate(this)?;
    Ok(false)
}

/// Default coercion: returns the receiver unchanged.
pub fn to_immutable(env: &dyn Environment, this: ObjHandle) -> AbiResult<ObjHandle> {
    env.validate(this)?;
    Ok(this)
}

/// Reflective type object of the receiver's runtime type.
pub fn type_of(env: &dyn Environment, this: ObjHandle) -> AbiResult<ObjHandle> {
    let ty = env.type_of(this)?;
    env.type_object(ty.type_id)
}

/// Pre-reclamation hook. Does nothing and keeps no reference to `this`.
pub fn finalize(env: &dyn Environment, this: ObjHandle) -> AbiResult<()> {
    env.validate(this)
}

/// Write the receiver's `toStr` (overrides included) and a newline to stdout.
pub fn echo(env: &dyn Environment, this: ObjHandle) -> AbiResult<()> {
    let rendered = trap::trap(env, this, TO_STR, None)?;
    let text = env.read_string(rendered)?;
    env.write_stdout(&text)
}

/// Per-type static initializer used when a type declares none.
pub fn static_init(_env: &dyn Environment, _type_id: TypeId) -> AbiResult<()> {
    Ok(())
}

/// `isImmutable` for freezable types: reports the frozen flag.
pub fn is_frozen_immutable(env: &dyn Environment, this: ObjHandle) -> AbiResult<bool> {
    env.is_frozen(this)
}

/// `toImmutable` for freezable types: freezes in place and returns `this`.
pub fn freeze_to_immutable(env: &dyn Environment, this: ObjHandle) -> AbiResult<ObjHandle> {
    env.freeze(this)?;
    Ok(this)
}

fn receiver(argv: &[ValueSlot]) -> AbiResult<ObjHandle> {
    argv.first()
        .ok_or("missing receiver")?
        .expect_handle()
}

fn ordering_slot(ordering: Ordering) -> ValueSlot {
    ValueSlot::small_int(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Bind the protocol (and `trap`) as native methods of the root type.
pub fn install(methods: &mut NativeMethodRegistry) {
    methods.register(EQUALS, MethodSignature::exact([SlotKind::Any]), |env, argv| {
        Ok(ValueSlot::bool(equals(env, receiver(argv)?, argv[1])?))
    });
    methods.register(COMPARE, MethodSignature::exact([SlotKind::Handle]), |env, argv| {
        let other = argv[1].expect_handle()?;
        Ok(ordering_slot(compare(env, receiver(argv)?, other)?))
    });
    methods.register(HASH, MethodSignature::none(), |env, argv| {
        ValueSlot::int(hash(env, receiver(argv)?)?)
    });
    methods.register(TO_STR, MethodSignature::none(), |env, argv| {
        Ok(ValueSlot::handle(to_str(env, receiver(argv)?)?))
    });
    methods.register(IS_IMMUTABLE, MethodSignature::none(), |env, argv| {
        Ok(ValueSlot::bool(is_immutable(env, receiver(argv)?)?))
    });
    methods.register(TO_IMMUTABLE, MethodSignature::none(), |env, argv| {
        Ok(ValueSlot::handle(to_immutable(env, receiver(argv)?)?))
    });
    methods.register(TYPE_OF, MethodSignature::none(), |env, argv| {
        Ok(ValueSlot::handle(type_of(env, receiver(argv)?)?))
    });
    methods.register(FINALIZE, MethodSignature::none(), |env, argv| {
        finalize(env, receiver(argv)?)?;
        Ok(ValueSlot::null())
    });
    methods.register(ECHO, MethodSignature::none(), |env, argv| {
        echo(env, receiver(argv)?)?;
        Ok(ValueSlot::null())
    });
    methods.register(
        TRAP,
        MethodSignature::with_optional([SlotKind::Handle, SlotKind::Any], 1),
        |env, argv| {
            let args = argv.get(2).copied().unwrap_or_default();
            trap::trap_dynamic(env, receiver(argv)?, argv[1], args)
        },
    );
}

/// Immutability overrides for freezable types.
pub fn install_freezable(methods: &mut NativeMethodRegistry) {
    methods.register(IS_IMMUTABLE, MethodSignature::none(), |env, argv| {
        Ok(ValueSlot::bool(is_frozen_immutable(env, receiver(argv)?)?))
    });
    methods.register(TO_IMMUTABLE, MethodSignature::none(), |env, argv| {
        Ok(ValueSlot::handle(freeze_to_immutable(env, receiver(argv)?)?))
    });
}

/// Immutability overrides for always-immutable built-ins (`Str`, `Type`).
pub fn install_value_type(methods: &mut NativeMethodRegistry) {
    methods.register(IS_IMMUTABLE, MethodSignature::none(), |env, argv| {
        env.validate(receiver(argv)?)?;
        Ok(ValueSlot::bool(true))
    });
    methods.register(TO_IMMUTABLE, MethodSignature::none(), |env, argv| {
        let this = receiver(argv)?;
        env.validate(this)?;
        Ok(ValueSlot::handle(this))
    });
}
