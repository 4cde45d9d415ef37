//! Shared newtypes used across the CFG normalizer, event stream, lowering
//! and register allocator crates.
//!
//! Mirrors `fuel-types`' pattern of one macro generating a family of
//! `#[repr(transparent)]` index newtypes, rather than passing bare `u32`s
//! around.

#![warn(missing_docs)]

use core::fmt;

macro_rules! index_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel value meaning "no index" (all bits set).
            pub const SENTINEL: Self = Self(u32::MAX);

            /// Wrap a raw index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Unwrap to the raw index.
            #[inline]
            pub const fn get(self) -> u32 {
                self.0
            }

            /// Unwrap to `usize`, for indexing slices.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// `true` if this is [`Self::SENTINEL`].
            #[inline]
            pub const fn is_sentinel(self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(v: usize) -> Self {
                Self(v as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_sentinel() {
                    write!(f, "{}(SENTINEL)", stringify!($name))
                } else {
                    write!(f, "{}({})", stringify!($name), self.0)
                }
            }
        }
    };
}

index_newtype!(
    /// Index into a [`Module`]'s `blockArray`, post block-list interning.
    ///
    /// [`Module`]: https://docs.rs/tilc-cfg
    BlockIndex
);

index_newtype!(
    /// Index into the packed event stream (`code`/`data` arrays).
    EventIndex
);

index_newtype!(
    /// Pre-order offset within a dominator (or post-dominator) tree.
    DomTreeId
);

/// Loop nesting depth of a block, per §4.1 step 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[repr(transparent)]
pub struct LoopDepth(pub u32);

/// Identifies a physical register file an alias-set of fixed-register
/// constraints belongs to. Low 3 bits of certain opcodes (§3.2) select one
/// of these; a 4th bit in the raw encoding distinguishes alias sets that
/// don't fit in 3 bits, which this enum folds in directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum AliasSet {
    /// General-purpose integer registers.
    Gpr = 0,
    /// The x86 flags register (condition codes).
    Flags = 1,
    /// Legacy MMX registers.
    Mmx = 2,
    /// SSE/AVX vector registers.
    Sse = 3,
    /// AVX-512 mask registers.
    Mask = 4,
}

impl AliasSet {
    /// Number of addressable registers in this alias set's bitmask, for the
    /// purposes of register allocation (§4.5). `Flags` has exactly one bit
    /// because there is only one flags register to contend for.
    pub const fn register_count(self) -> u32 {
        match self {
            AliasSet::Gpr => 16,
            AliasSet::Flags => 1,
            AliasSet::Mmx => 8,
            AliasSet::Sse => 16,
            AliasSet::Mask => 8,
        }
    }
}

bitflags::bitflags! {
    /// A bitmask over the registers of one [`AliasSet`], as produced by the
    /// register allocator (§4.5) and consumed by the lowering-to-`Instr`
    /// glue when resolving a value's physical register.
    #[derive(Default)]
    pub struct RegisterMask: u32 {
        /// No register: unassigned / spilled.
        const NONE = 0;
    }
}

impl RegisterMask {
    /// Build a mask with exactly one bit set, for physical register `n`.
    #[inline]
    pub const fn single(n: u32) -> Self {
        Self::from_bits_truncate(1u32 << n)
    }

    /// Index (0-based) of the lowest set bit, the allocator's convention
    /// for "the chosen register" (§4.5 step 7: "lowest-set-bit of the first
    /// nonempty" candidate mask).
    #[inline]
    pub fn lowest_bit_index(self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(self.bits().trailing_zeros())
        }
    }

    /// The mask containing only the lowest set bit of `self`.
    #[inline]
    pub fn lowest_bit(self) -> Self {
        match self.lowest_bit_index() {
            Some(n) => Self::single(n),
            None => Self::NONE,
        }
    }
}

/// Packed scalar/vector type descriptor carried in sub-opcode fields
/// (§4.2 "Type descriptor encoding"): `{vectorWidth:3, logBits:3, type:2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor(u8);

/// Base type tag of a [`TypeDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BaseType {
    /// Untyped bit pattern.
    BinaryData = 0,
    /// Unsigned integer.
    Unsigned = 1,
    /// Signed integer.
    Signed = 2,
    /// IEEE float.
    Float = 3,
}

impl TypeDescriptor {
    /// Build a descriptor from its three fields. `log_bits` is
    /// `log2(scalar size in bits)`, i.e. 0 for 1-bit, 3 for 8-bit, 6 for
    /// 64-bit. `vector_width` is `log2(lane count)`, 0 for scalar.
    pub const fn new(vector_width: u8, log_bits: u8, base_type: BaseType) -> Self {
        let vw = vector_width & 0x7;
        let lb = log_bits & 0x7;
        let bt = base_type as u8 & 0x3;
        Self(vw | (lb << 3) | (bt << 6))
    }

    /// Raw byte form, as stored in a sub-opcode.
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// Reconstruct from a raw byte.
    pub const fn from_byte(b: u8) -> Self {
        Self(b)
    }

    /// `log2` of the lane count (0 = scalar).
    pub const fn vector_width(self) -> u8 {
        self.0 & 0x7
    }

    /// `log2` of the scalar width in bits.
    pub const fn log_bits(self) -> u8 {
        (self.0 >> 3) & 0x7
    }

    /// Scalar width in bits (`1 << log_bits`), except `log_bits == 0` which
    /// is defined as 1 bit (booleans).
    pub const fn bits(self) -> u32 {
        let lb = self.log_bits();
        if lb == 0 {
            1
        } else {
            1u32 << lb
        }
    }

    /// Base type tag.
    pub const fn base_type(self) -> BaseType {
        match (self.0 >> 6) & 0x3 {
            0 => BaseType::BinaryData,
            1 => BaseType::Unsigned,
            2 => BaseType::Signed,
            _ => BaseType::Float,
        }
    }

    /// `true` if this descriptor denotes a vector (lane count > 1).
    pub const fn is_vector(self) -> bool {
        self.vector_width() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_roundtrip() {
        assert!(BlockIndex::SENTINEL.is_sentinel());
        assert_eq!(BlockIndex::new(3).index(), 3);
    }

    #[test]
    fn register_mask_lowest_bit() {
        let m = RegisterMask::single(2) | RegisterMask::single(5);
        assert_eq!(m.lowest_bit_index(), Some(2));
        assert_eq!(m.lowest_bit(), RegisterMask::single(2));
        assert_eq!(RegisterMask::NONE.lowest_bit_index(), None);
    }

    #[test]
    fn type_descriptor_roundtrip() {
        let td = TypeDescriptor::new(0, 5, BaseType::Signed); // int32
        assert_eq!(td.bits(), 32);
        assert!(matches!(td.base_type(), BaseType::Signed));
        assert!(!td.is_vector());
        assert_eq!(TypeDescriptor::from_byte(td.to_byte()), td);
    }
}
