// src/types/order.rs

use core::fmt;
use serde::{Serialize, Serializer};

/// Byte order of a Modbus value on the wire.
///
/// Letters name the bytes of the big-endian value, `A` being the most
/// significant one. `CDAB` therefore means "swap the two 16-bit words".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ByteOrder {
    Ab = 0,
    Ba = 1,
    Abcd = 2,
    Badc = 3,
    Cdab = 4,
    Dcba = 5,
    Abcdefgh = 6,
    Badcfehg = 7,
    Cdabghef = 8,
    Dcbahgfe = 9,
    Efghabcd = 10,
    Fehgbadc = 11,
    Ghefcdab = 12,
    Hgfedcba = 13,
}

// out[i] = in[PERMUTATIONS[order][i]]
const PERMUTATIONS: [&[usize]; 14] = [
    &[0, 1],
    &[1, 0],
    &[0, 1, 2, 3],
    &[1, 0, 3, 2],
    &[2, 3, 0, 1],
    &[3, 2, 1, 0],
    &[0, 1, 2, 3, 4, 5, 6, 7],
    &[1, 0, 3, 2, 5, 4, 7, 6],
    &[2, 3, 0, 1, 6, 7, 4, 5],
    &[3, 2, 1, 0, 7, 6, 5, 4],
    &[4, 5, 6, 7, 0, 1, 2, 3],
    &[5, 4, 7, 6, 1, 0, 3, 2],
    &[6, 7, 4, 5, 2, 3, 0, 1],
    &[7, 6, 5, 4, 3, 2, 1, 0],
];

const NAMES: [&str; 14] = [
    "AB", "BA", "ABCD", "BADC", "CDAB", "DCBA", "ABCDEFGH", "BADCFEHG", "CDABGHEF", "DCBAHGFE",
    "EFGHABCD", "FEHGBADC", "GHEFCDAB", "HGFEDCBA",
];

impl ByteOrder {
    pub const ALL: [ByteOrder; 14] = [
        ByteOrder::Ab,
        ByteOrder::Ba,
        ByteOrder::Abcd,
        ByteOrder::Badc,
        ByteOrder::Cdab,
        ByteOrder::Dcba,
        ByteOrder::Abcdefgh,
        ByteOrder::Badcfehg,
        ByteOrder::Cdabghef,
        ByteOrder::Dcbahgfe,
        ByteOrder::Efghabcd,
        ByteOrder::Fehgbadc,
        ByteOrder::Ghefcdab,
        ByteOrder::Hgfedcba,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn name(self) -> &'static str {
        NAMES[self as usize]
    }

    /// Case-insensitive lookup by name (`"cdab"`, `"HGFEDCBA"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn permutation(self) -> &'static [usize] {
        PERMUTATIONS[self as usize]
    }

    /// Size of the value in bytes: 2, 4 or 8.
    pub fn byte_size(self) -> usize {
        self.permutation().len()
    }

    /// Number of 16-bit registers the value occupies.
    pub fn words(self) -> u16 {
        match self.byte_size() {
            2 => 1,
            4 => 2,
            _ => 4,
        }
    }

    /// The order that undoes this one.
    pub fn inverse(self) -> ByteOrder {
        let perm = self.permutation();
        let mut inverse = [0usize; 8];
        for (i, &from) in perm.iter().enumerate() {
            inverse[from] = i;
        }
        let inverse = &inverse[..perm.len()];
        Self::ALL
            .iter()
            .copied()
            .find(|o| o.permutation() == inverse)
            .unwrap_or(self)
    }

    /// Rearranges a big-endian value into this wire order.
    ///
    /// `bytes` must have exactly `byte_size()` bytes; any other length is
    /// returned unchanged.
    pub fn mangle<const N: usize>(self, bytes: [u8; N]) -> [u8; N] {
        let perm = self.permutation();
        if perm.len() != N {
            return bytes;
        }
        let mut out = [0u8; N];
        for (slot, &from) in out.iter_mut().zip(perm) {
            *slot = bytes[from];
        }
        out
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ByteOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
