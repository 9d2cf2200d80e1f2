// src/types/flags.rs

use alloc::vec::Vec;
use core::ops::{BitAnd, BitOr, Not};
use serde::Serialize;

/// Shared bit-set methods for the flag newtypes below.
macro_rules! flag_set {
    ($name:ident, $bits:ty, [$(($flag:ident, $label:literal)),* $(,)?]) => {
        impl $name {
            /// Creates the set from a raw value.
            pub fn from_bits_truncate(bits: $bits) -> Self {
                Self(bits)
            }

            pub fn bits(&self) -> $bits {
                self.0
            }

            /// Returns an empty set of flags.
            pub fn empty() -> Self {
                Self(0)
            }

            pub fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// Checks if all of the specified flags are set.
            pub fn contains(&self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            /// Inserts the specified flags.
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Removes the specified flags.
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// Inserts or removes the specified flags.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            /// Lowercase names of the set flags, for listings.
            pub fn names(&self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $(
                    if self.contains(Self::$flag) {
                        names.push($label);
                    }
                )*
                names
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self::Output {
                Self(self.0 | rhs.0)
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self::Output {
                Self(self.0 & rhs.0)
            }
        }

        impl Not for $name {
            type Output = Self;
            fn not(self) -> Self::Output {
                Self(!self.0)
            }
        }
    };
}

/// Flags of a command or init record.
///
/// The low byte holds the per-command behavior bits, the high byte the
/// serial format bits a comms override record applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct CommandFlags(pub u16);

impl CommandFlags {
    // --- Flag Constants ---
    pub const TIMESOUT: Self = Self(1 << 0);
    pub const BCANSWER: Self = Self(1 << 1);
    pub const NOANSWER: Self = Self(1 << 2);
    pub const RESEND: Self = Self(1 << 3);
    pub const WRITE_FLUSH: Self = Self(1 << 4);
    pub const PARITY_EN: Self = Self(1 << 8);
    pub const PARITY_ODD: Self = Self(1 << 9);
    pub const STOPBITS2: Self = Self(1 << 10);

    /// Bits meaningful on init records.
    pub const INIT_MASK: Self = Self(0x0707);
    /// Bits meaningful on cyclic commands.
    pub const COMMAND_MASK: Self = Self(0x001f);
}

flag_set!(
    CommandFlags,
    u16,
    [
        (TIMESOUT, "timesout"),
        (BCANSWER, "bcanswer"),
        (NOANSWER, "noanswer"),
        (RESEND, "resend"),
        (WRITE_FLUSH, "writeflush"),
        (PARITY_EN, "parityen"),
        (PARITY_ODD, "parityodd"),
        (STOPBITS2, "stopbits2"),
    ]
);

/// Per-pin conversion flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct PinFlags(pub u8);

impl PinFlags {
    pub const SCALE: Self = Self(1 << 0);
    pub const CLAMP: Self = Self(1 << 1);
    pub const MASK: Self = Self(0x03);
}

flag_set!(PinFlags, u8, [(SCALE, "scale"), (CLAMP, "clamp")]);

/// Serial format bits of the image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct FormatFlags(pub u16);

impl FormatFlags {
    pub const PARITY_EN: Self = Self(1 << 0);
    pub const PARITY_ODD: Self = Self(1 << 1);
    pub const STOPBITS2: Self = Self(1 << 2);
    pub const DUPLEX: Self = Self(1 << 3);
    pub const SUSPEND: Self = Self(1 << 4);
}

flag_set!(
    FormatFlags,
    u16,
    [
        (PARITY_EN, "parityen"),
        (PARITY_ODD, "parityodd"),
        (STOPBITS2, "stopbits2"),
        (DUPLEX, "duplex"),
        (SUSPEND, "suspend"),
    ]
);
