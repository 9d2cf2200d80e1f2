// src/types.rs

//! Static tables: Modbus function codes, wire types, HAL pin types, flags
//! and the fixed limits of the hm2_modbus state machine.

mod flags;
mod order;

use core::fmt;
use serde::{Serialize, Serializer};

pub use flags::{CommandFlags, FormatFlags, PinFlags};
pub use order::ByteOrder;

/// Longest delay or timeout in microseconds.
pub const MAX_DELAY: u32 = 60_000_000;
/// Longest `timeoutbits` value.
pub const MAX_DELAY_BITS: u32 = 1_000_000;
/// Longest pin name, not counting the device prefix.
pub const MAX_PIN_NAME: usize = 32;
/// Longest command name; leaves room for the `-NN` auto-pin suffix.
pub const MAX_COMMAND_NAME: usize = MAX_PIN_NAME - 3;
/// Longest device name.
pub const MAX_DEVICE_NAME: usize = 32;
/// Longest command repeat interval in microseconds.
pub const MAX_INTERVAL: u32 = 3_600_000_000;
/// Interval value meaning "run once, never repeat".
pub const INTERVAL_ONCE: u32 = 0xffff_ffff;
/// Name of the implicit broadcast device (address 0).
pub const BROADCAST: &str = "broadcast";
/// Highest regular slave address; 248..=255 are reserved.
pub const MAX_SLAVE_ADDRESS: u8 = 247;
/// Most typed pins one register command can carry.
pub const MAX_TYPED_PINS: usize = 63;
/// Maximum `skip` value of a pin placeholder.
pub const MAX_SKIP: u16 = 24;
/// `skip` above this suggests splitting the command.
pub const SKIP_WARN: u16 = 11;

/// Modbus function codes understood by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Function {
    ReadCoils = 1,
    ReadInputs = 2,
    ReadRegisters = 3,
    ReadInputRegs = 4,
    WriteCoil = 5,
    WriteRegister = 6,
    WriteCoils = 15,
    WriteRegisters = 16,
}

impl Function {
    pub const ALL: [Function; 8] = [
        Function::ReadCoils,
        Function::ReadInputs,
        Function::ReadRegisters,
        Function::ReadInputRegs,
        Function::WriteCoil,
        Function::WriteRegister,
        Function::WriteCoils,
        Function::WriteRegisters,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::ReadCoils => "R_COILS",
            Function::ReadInputs => "R_INPUTS",
            Function::ReadRegisters => "R_REGISTERS",
            Function::ReadInputRegs => "R_INPUTREGS",
            Function::WriteCoil => "W_COIL",
            Function::WriteRegister => "W_REGISTER",
            Function::WriteCoils => "W_COILS",
            Function::WriteRegisters => "W_REGISTERS",
        }
    }

    /// Case-insensitive lookup by function name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Largest element count a single request may carry.
    pub fn max_count(self) -> u16 {
        match self {
            Function::ReadCoils | Function::ReadInputs | Function::WriteCoils => 2000,
            Function::ReadRegisters | Function::ReadInputRegs | Function::WriteRegisters => 125,
            Function::WriteCoil | Function::WriteRegister => 1,
        }
    }

    pub fn is_write(self) -> bool {
        matches!(
            self,
            Function::WriteCoil
                | Function::WriteRegister
                | Function::WriteCoils
                | Function::WriteRegisters
        )
    }

    /// Bit (coil/discrete input) functions, as opposed to register functions.
    pub fn is_bit(self) -> bool {
        matches!(
            self,
            Function::ReadCoils | Function::ReadInputs | Function::WriteCoil | Function::WriteCoils
        )
    }

    pub fn is_register(self) -> bool {
        !self.is_bit()
    }

    /// Functions that address a single element and ignore `count`.
    pub fn is_single(self) -> bool {
        matches!(self, Function::WriteCoil | Function::WriteRegister)
    }
}

impl TryFrom<u8> for Function {
    type Error = u8;

    /// Fails with the rejected code when the function is not supported.
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(code)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Function {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Numeric interpretation of a Modbus value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Unsigned = 0x00,
    Signed = 0x10,
    Float = 0x20,
}

impl ValueKind {
    pub fn prefix(self) -> char {
        match self {
            ValueKind::Unsigned => 'U',
            ValueKind::Signed => 'S',
            ValueKind::Float => 'F',
        }
    }
}

/// Wire type of a Modbus value: kind plus byte order (which fixes the width).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModbusType {
    kind: ValueKind,
    order: ByteOrder,
}

impl ModbusType {
    pub const U_AB: Self = Self::new(ValueKind::Unsigned, ByteOrder::Ab);
    pub const S_AB: Self = Self::new(ValueKind::Signed, ByteOrder::Ab);
    pub const F_AB: Self = Self::new(ValueKind::Float, ByteOrder::Ab);

    pub const fn new(kind: ValueKind, order: ByteOrder) -> Self {
        Self { kind, order }
    }

    pub fn kind(self) -> ValueKind {
        self.kind
    }

    pub fn order(self) -> ByteOrder {
        self.order
    }

    /// Descriptor byte as stored in the type table: kind | order.
    pub fn code(self) -> u8 {
        self.kind as u8 | self.order.code()
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let kind = match code & 0xf0 {
            0x00 => ValueKind::Unsigned,
            0x10 => ValueKind::Signed,
            0x20 => ValueKind::Float,
            _ => return None,
        };
        ByteOrder::from_code(code & 0x0f).map(|order| Self::new(kind, order))
    }

    /// Case-insensitive lookup, e.g. `"S_CDAB"` or `"f_abcd"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let (prefix, order) = name.split_once('_')?;
        let kind = if prefix.eq_ignore_ascii_case("U") {
            ValueKind::Unsigned
        } else if prefix.eq_ignore_ascii_case("S") {
            ValueKind::Signed
        } else if prefix.eq_ignore_ascii_case("F") {
            ValueKind::Float
        } else {
            return None;
        };
        ByteOrder::from_name(order).map(|order| Self::new(kind, order))
    }

    pub fn byte_size(self) -> usize {
        self.order.byte_size()
    }

    /// Number of 16-bit registers one value occupies.
    pub fn words(self) -> u16 {
        self.order.words()
    }

    /// Largest number of values of this type in one register request.
    pub fn max_count(self) -> u16 {
        match self.words() {
            1 => 125,
            2 => 62,
            _ => 31,
        }
    }

    pub fn is_signed(self) -> bool {
        self.kind == ValueKind::Signed
    }

    pub fn is_unsigned(self) -> bool {
        self.kind == ValueKind::Unsigned
    }

    pub fn is_float(self) -> bool {
        self.kind == ValueKind::Float
    }
}

impl fmt::Display for ModbusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.order)
    }
}

impl Serialize for ModbusType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Type of the HAL pin a Modbus value is exported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HalType {
    Bit = 1,
    Float = 2,
    S32 = 3,
    U32 = 4,
    S64 = 6,
    U64 = 7,
}

impl HalType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            HalType::Bit => "HAL_BIT",
            HalType::Float => "HAL_FLOAT",
            HalType::S32 => "HAL_S32",
            HalType::U32 => "HAL_U32",
            HalType::S64 => "HAL_S64",
            HalType::U64 => "HAL_U64",
        }
    }

    /// Case-insensitive lookup with or without the `HAL_` prefix; `FLT` is
    /// accepted for `FLOAT`.
    pub fn from_name(name: &str) -> Option<Self> {
        let short = match name.get(..4) {
            Some(p) if p.eq_ignore_ascii_case("HAL_") => &name[4..],
            _ => name,
        };
        [
            ("BIT", HalType::Bit),
            ("FLOAT", HalType::Float),
            ("FLT", HalType::Float),
            ("S32", HalType::S32),
            ("U32", HalType::U32),
            ("S64", HalType::S64),
            ("U64", HalType::U64),
        ]
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(short))
        .map(|&(_, t)| t)
    }

    /// Width of the HAL value in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            HalType::Bit => 1,
            HalType::S32 | HalType::U32 => 4,
            HalType::Float | HalType::S64 | HalType::U64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, HalType::S32 | HalType::S64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, HalType::U32 | HalType::U64)
    }
}

impl fmt::Display for HalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for HalType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
