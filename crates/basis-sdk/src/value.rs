//! ValueSlot: NaN-boxed u64 argument/return slot
//!
//! Every value crossing the native boundary travels in one of these. The tag
//! and payload are written together by the typed constructors and read back
//! only through checked extractors, so a slot can never be interpreted with
//! the wrong tag.
//!
//! # Encoding
//!
//! ```text
//! f64 (float): Any value where upper 13 bits != 0x1FFF (raw IEEE 754)
//! Tagged:      0xFFF8 + 3-bit tag + 48-bit payload (NaN-boxed)
//!   - Handle: 0xFFF8000000000000 | handle.to_bits()          [tag=000]
//!   - int:    0xFFF8001000000000 | (i64 & 0xFFFFFFFFFFFF)    [tag=001]
//!   - bool:   0xFFF8002000000000 | (b as u64)                [tag=010]
//!   - null:   0xFFF8006000000000                             [tag=110]
//! ```
//!
//! NaN floats are canonicalized to a quiet NaN outside the boxed range.

use crate::error::{AbiResult, NativeError};
use crate::handle::ObjHandle;

/// NaN-boxed 64-bit slot carrying a handle or an unboxed scalar.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ValueSlot(u64);

const NAN_BOX_BASE: u64 = 0xFFF8_0000_0000_0000;
const TAG_SHIFT: u64 = 48;
const TAG_MASK: u64 = 0x7 << TAG_SHIFT;
const PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

const TAG_HANDLE: u64 = 0x0;
const TAG_INT: u64 = 0x1;
const TAG_BOOL: u64 = 0x2;
const TAG_NULL: u64 = 0x6;

const NULL_BITS: u64 = NAN_BOX_BASE | (TAG_NULL << TAG_SHIFT);
const TRUE_BITS: u64 = NAN_BOX_BASE | (TAG_BOOL << TAG_SHIFT) | 1;
const FALSE_BITS: u64 = NAN_BOX_BASE | (TAG_BOOL << TAG_SHIFT);

/// Quiet NaN that stays outside the boxed range
const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

/// Smallest int representable in the 48-bit payload
pub const INT_MIN: i64 = -(1 << 47);
/// Largest int representable in the 48-bit payload
pub const INT_MAX: i64 = (1 << 47) - 1;

/// Kind of value held in a slot, used by method signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Accepts any slot
    Any,
    /// Object handle
    Handle,
    /// 48-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// IEEE 754 double
    Float,
    /// Null
    Null,
}

impl SlotKind {
    /// Name used in error messages
    pub const fn name(self) -> &'static str {
        match self {
            SlotKind::Any => "any",
            SlotKind::Handle => "handle",
            SlotKind::Int => "int",
            SlotKind::Bool => "bool",
            SlotKind::Float => "float",
            SlotKind::Null => "null",
        }
    }

    /// Whether a slot of kind `actual` satisfies this kind
    pub fn accepts(self, actual: SlotKind) -> bool {
        self == SlotKind::Any || self == actual
    }
}

impl ValueSlot {
    // ========================================================================
    // Raw bits
    // ========================================================================

    /// Create from raw u64 bits.
    ///
    /// Returns `TypeMismatch` for boxed bits no typed constructor produces:
    /// unknown tags, a bool payload other than 0/1, or a non-zero null payload.
    pub fn try_from_bits(bits: u64) -> AbiResult<Self> {
        let slot = Self(bits);
        if !slot.is_nan_boxed() {
            return Ok(slot);
        }
        let payload = bits & PAYLOAD_MASK;
        let well_formed = match slot.get_tag() {
            TAG_HANDLE | TAG_INT => true,
            TAG_BOOL => payload <= 1,
            TAG_NULL => payload == 0,
            _ => false,
        };
        if well_formed {
            Ok(slot)
        } else {
            Err(NativeError::TypeMismatch {
                expected: "value slot".to_string(),
                got: format!("{:#018x}", bits),
            })
        }
    }

    /// Get raw u64 bits
    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a null slot
    #[inline]
    pub const fn null() -> Self {
        Self(NULL_BITS)
    }

    /// Create a boolean slot
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Self(if b { TRUE_BITS } else { FALSE_BITS })
    }

    /// Create an int slot.
    ///
    /// Returns `TypeMismatch` when `i` does not fit the 48-bit payload.
    pub fn int(i: i64) -> AbiResult<Self> {
        if !(INT_MIN..=INT_MAX).contains(&i) {
            return Err(NativeError::TypeMismatch {
                expected: "int48".to_string(),
                got: i.to_string(),
            });
        }
        Ok(Self(NAN_BOX_BASE | (TAG_INT << TAG_SHIFT) | (i as u64 & PAYLOAD_MASK)))
    }

    /// Create an int slot from a value known to fit
    #[inline]
    pub const fn small_int(i: i32) -> Self {
        Self(NAN_BOX_BASE | (TAG_INT << TAG_SHIFT) | ((i as i64) as u64 & PAYLOAD_MASK))
    }

    /// Create a float slot (raw IEEE 754, not NaN-boxed)
    #[inline]
    pub fn float(f: f64) -> Self {
        if f.is_nan() {
            Self(CANONICAL_NAN)
        } else {
            Self(f.to_bits())
        }
    }

    /// Create a handle slot
    #[inline]
    pub const fn handle(h: ObjHandle) -> Self {
        Self(NAN_BOX_BASE | (TAG_HANDLE << TAG_SHIFT) | h.to_bits())
    }

    // ========================================================================
    // Type checks
    // ========================================================================

    #[inline]
    const fn is_nan_boxed(&self) -> bool {
        (self.0 & NAN_BOX_BASE) == NAN_BOX_BASE
    }

    #[inline]
    const fn get_tag(&self) -> u64 {
        (self.0 & TAG_MASK) >> TAG_SHIFT
    }

    /// Kind of value held in this slot
    pub const fn kind(&self) -> SlotKind {
        if !self.is_nan_boxed() {
            return SlotKind::Float;
        }
        match self.get_tag() {
            TAG_HANDLE => SlotKind::Handle,
            TAG_INT => SlotKind::Int,
            TAG_BOOL => SlotKind::Bool,
            _ => SlotKind::Null,
        }
    }

    /// Check if slot is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == NULL_BITS
    }

    /// Check if slot holds an object handle
    #[inline]
    pub const fn is_handle(&self) -> bool {
        self.is_nan_boxed() && self.get_tag() == TAG_HANDLE
    }

    // ========================================================================
    // Extractors
    // ========================================================================

    /// Extract object handle
    #[inline]
    pub const fn as_handle(&self) -> Option<ObjHandle> {
        if self.is_handle() {
            Some(ObjHandle::from_bits(self.0 & PAYLOAD_MASK))
        } else {
            None
        }
    }

    /// Extract int, sign-extending the 48-bit payload
    #[inline]
    pub const fn as_int(&self) -> Option<i64> {
        if self.is_nan_boxed() && self.get_tag() == TAG_INT {
            Some(((self.0 & PAYLOAD_MASK) << 16) as i64 >> 16)
        } else {
            None
        }
    }

    /// Extract boolean
    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        if self.is_nan_boxed() && self.get_tag() == TAG_BOOL {
            Some((self.0 & PAYLOAD_MASK) != 0)
        } else {
            None
        }
    }

    /// Extract float
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        if self.is_nan_boxed() {
            None
        } else {
            Some(f64::from_bits(self.0))
        }
    }

    // ========================================================================
    // Checked extractors
    // ========================================================================

    fn mismatch(&self, expected: SlotKind) -> NativeError {
        NativeError::TypeMismatch {
            expected: expected.name().to_string(),
            got: self.type_name().to_string(),
        }
    }

    /// Extract object handle or fail with `TypeMismatch`
    pub fn expect_handle(&self) -> AbiResult<ObjHandle> {
        self.as_handle().ok_or_else(|| self.mismatch(SlotKind::Handle))
    }

    /// Extract int or fail with `TypeMismatch`
    pub fn expect_int(&self) -> AbiResult<i64> {
        self.as_int().ok_or_else(|| self.mismatch(SlotKind::Int))
    }

    /// Extract bool or fail with `TypeMismatch`
    pub fn expect_bool(&self) -> AbiResult<bool> {
        self.as_bool().ok_or_else(|| self.mismatch(SlotKind::Bool))
    }

    /// Extract float or fail with `TypeMismatch`
    pub fn expect_float(&self) -> AbiResult<f64> {
        self.as_float().ok_or_else(|| self.mismatch(SlotKind::Float))
    }

    /// Get type name for debugging
    pub const fn type_name(&self) -> &'static str {
        self.kind().name()
    }
}

impl Default for ValueSlot {
    fn default() -> Self {
        Self::null()
    }
}

impl From<ObjHandle> for ValueSlot {
    fn from(h: ObjHandle) -> Self {
        ValueSlot::handle(h)
    }
}

impl From<bool> for ValueSlot {
    fn from(b: bool) -> Self {
        ValueSlot::bool(b)
    }
}

impl From<i32> for ValueSlot {
    fn from(i: i32) -> Self {
        ValueSlot::small_int(i)
    }
}

impl From<f64> for ValueSlot {
    fn from(f: f64) -> Self {
        ValueSlot::float(f)
    }
}

impl std::fmt::Debug for ValueSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            SlotKind::Float => write!(f, "ValueSlot::Float({})", f64::from_bits(self.0)),
            SlotKind::Handle => write!(f, "ValueSlot::Handle({:?})", ObjHandle::from_bits(self.0 & PAYLOAD_MASK)),
            SlotKind::Int => write!(f, "ValueSlot::Int({})", ((self.0 & PAYLOAD_MASK) << 16) as i64 >> 16),
            SlotKind::Bool => write!(f, "ValueSlot::Bool({})", (self.0 & PAYLOAD_MASK) != 0),
            SlotKind::Null | SlotKind::Any => write!(f, "ValueSlot::Null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null() {
        let v = ValueSlot::null();
        assert!(v.is_null());
        assert!(!v.is_handle());
        assert_eq!(v.kind(), SlotKind::Null);
        assert_eq!(v.as_int(), None);
    }

    #[test]
    fn test_bool() {
        assert_eq!(ValueSlot::bool(true).as_bool(), Some(true));
        assert_eq!(ValueSlot::bool(false).as_bool(), Some(false));
        assert_eq!(ValueSlot::bool(true).as_handle(), None);
    }

    #[test]
    fn test_int_sign_extension() {
        let v = ValueSlot::int(-5).unwrap();
        assert_eq!(v.as_int(), Some(-5));
        assert_eq!(ValueSlot::int(INT_MIN).unwrap().as_int(), Some(INT_MIN));
        assert_eq!(ValueSlot::int(INT_MAX).unwrap().as_int(), Some(INT_MAX));
        assert_eq!(ValueSlot::small_int(i32::MIN).as_int(), Some(i32::MIN as i64));
    }

    #[test]
    fn test_int_out_of_range() {
        let err = ValueSlot::int(INT_MAX + 1).unwrap_err();
        assert!(matches!(err, NativeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_float() {
        let v = ValueSlot::float(3.5);
        assert_eq!(v.as_float(), Some(3.5));
        assert_eq!(v.kind(), SlotKind::Float);

        let nan = ValueSlot::float(f64::NAN);
        assert!(nan.as_float().unwrap().is_nan());
        assert!(!nan.is_handle());
    }

    #[test]
    fn test_handle() {
        let h = ObjHandle::new(42, 3);
        let v = ValueSlot::handle(h);
        assert!(v.is_handle());
        assert_eq!(v.as_handle(), Some(h));
        assert_eq!(v.as_int(), None);
    }

    #[test]
    fn test_checked_extractors_report_mismatch() {
        let v = ValueSlot::small_int(1);
        match v.expect_handle() {
            Err(NativeError::TypeMismatch { expected, got }) => {
                assert_eq!(expected, "handle");
                assert_eq!(got, "int");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(ValueSlot::null().expect_bool().is_err());
        assert_eq!(v.expect_int().unwrap(), 1);
    }

    #[test]
    fn test_slot_kind_accepts() {
        assert!(SlotKind::Any.accepts(SlotKind::Handle));
        assert!(SlotKind::Int.accepts(SlotKind::Int));
        assert!(!SlotKind::Int.accepts(SlotKind::Float));
    }

    #[test]
    fn test_try_from_bits_accepts_constructed_slots() {
        let slots = [
            ValueSlot::null(),
            ValueSlot::bool(true),
            ValueSlot::small_int(-7),
            ValueSlot::float(2.25),
            ValueSlot::float(f64::NAN),
            ValueSlot::handle(ObjHandle::new(5, 9)),
        ];
        for slot in slots {
            assert_eq!(ValueSlot::try_from_bits(slot.to_bits()).unwrap(), slot);
        }
    }

    #[test]
    fn test_try_from_bits_rejects_unknown_tags() {
        for tag in [3u64, 4, 5, 7] {
            let bits = NAN_BOX_BASE | (tag << TAG_SHIFT);
            let err = ValueSlot::try_from_bits(bits).unwrap_err();
            assert!(matches!(err, NativeError::TypeMismatch { .. }), "tag {}", tag);
        }
        // malformed payloads under known tags
        assert!(ValueSlot::try_from_bits(NULL_BITS | 1).is_err());
        assert!(ValueSlot::try_from_bits(FALSE_BITS | 2).is_err());
    }

    #[test]
    fn test_debug_format() {
        let s = format!("{:?}", ValueSlot::small_int(42));
        assert!(s.contains("42"));
    }
}
