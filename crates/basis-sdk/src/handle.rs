//! ObjHandle: opaque, generation-checked reference to a managed object
//!
//! A handle is a slot index into the environment's object arena paired with
//! the generation the slot had when the object was allocated. Reclaiming an
//! object bumps the slot's generation, so a stale handle can always be told
//! apart from the object that later reuses the slot.
//!
//! ```text
//! bits 0..32   slot index
//! bits 32..48  generation
//! ```

use std::fmt;

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = 0x0000_0000_FFFF_FFFF;
const GENERATION_MASK: u64 = 0xFFFF;

/// Opaque, non-owning reference to a managed object.
///
/// Handles are only meaningful inside the environment that issued them and
/// only while the object is live. They are plain data: copying one never
/// keeps the object alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjHandle {
    index: u32,
    generation: u16,
}

impl ObjHandle {
    /// Create a handle from a slot index and generation (used by environments)
    #[inline]
    pub const fn new(index: u32, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Slot index into the object arena
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at allocation time
    #[inline]
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Pack into the 48-bit payload carried by a `ValueSlot`
    #[inline]
    pub const fn to_bits(self) -> u64 {
        (self.index as u64) | ((self.generation as u64) << INDEX_BITS)
    }

    /// Unpack from a 48-bit payload
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: (bits & INDEX_MASK) as u32,
            generation: ((bits >> INDEX_BITS) & GENERATION_MASK) as u16,
        }
    }
}

impl fmt::Debug for ObjHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjHandle({}#{})", self.index, self.generation)
    }
}

impl fmt::Display for ObjHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_roundtrip() {
        let h = ObjHandle::new(0xDEAD_BEEF, 7);
        let back = ObjHandle::from_bits(h.to_bits());
        assert_eq!(h, back);
        assert_eq!(back.index(), 0xDEAD_BEEF);
        assert_eq!(back.generation(), 7);
    }

    #[test]
    fn test_payload_fits_48_bits() {
        let h = ObjHandle::new(u32::MAX, u16::MAX);
        assert_eq!(h.to_bits() >> 48, 0);
    }

    #[test]
    fn test_generation_distinguishes_handles() {
        let a = ObjHandle::new(3, 0);
        let b = ObjHandle::new(3, 1);
        assert_ne!(a, b);
        assert_ne!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_display_is_hex() {
        let h = ObjHandle::new(0x10, 0);
        assert_eq!(h.to_string(), "0x10");
    }
}
