// src/config.rs

use crate::attrs::{parse_bool, parse_int};
use crate::types::{CommandFlags, FormatFlags};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use serde::Serialize;

/// Serial parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Parity {
    None = 0,
    Odd = 1,
    Even = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Duplex {
    Half = 0,
    Full = 1,
}

/// One communication parameter, as named by the document attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommField {
    Baudrate,
    Drivedelay,
    Duplex,
    Icdelay,
    Interval,
    Parity,
    Rxdelay,
    Stopbits,
    Suspend,
    Timeout,
    Txdelay,
    Writeflush,
}

impl CommField {
    pub const ALL: [CommField; 12] = [
        CommField::Baudrate,
        CommField::Drivedelay,
        CommField::Duplex,
        CommField::Icdelay,
        CommField::Interval,
        CommField::Parity,
        CommField::Rxdelay,
        CommField::Stopbits,
        CommField::Suspend,
        CommField::Timeout,
        CommField::Txdelay,
        CommField::Writeflush,
    ];

    /// Fields an init list record may override on the fly.
    pub const RATE: [CommField; 7] = [
        CommField::Baudrate,
        CommField::Drivedelay,
        CommField::Icdelay,
        CommField::Parity,
        CommField::Rxdelay,
        CommField::Stopbits,
        CommField::Txdelay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommField::Baudrate => "baudrate",
            CommField::Drivedelay => "drivedelay",
            CommField::Duplex => "duplex",
            CommField::Icdelay => "icdelay",
            CommField::Interval => "interval",
            CommField::Parity => "parity",
            CommField::Rxdelay => "rxdelay",
            CommField::Stopbits => "stopbits",
            CommField::Suspend => "suspend",
            CommField::Timeout => "timeout",
            CommField::Txdelay => "txdelay",
            CommField::Writeflush => "writeflush",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Inclusive legal range of the resolved value.
    pub fn limits(self) -> (i128, i128) {
        match self {
            CommField::Baudrate => (1200, 1_000_000),
            CommField::Drivedelay => (0, 31),
            CommField::Duplex => (0, 1),
            CommField::Icdelay => (0, 255),
            CommField::Interval => (0, 3_600_000_000),
            CommField::Parity => (0, 2),
            CommField::Rxdelay | CommField::Txdelay => (0, 1020),
            CommField::Stopbits => (1, 2),
            CommField::Suspend | CommField::Writeflush => (0, 1),
            CommField::Timeout => (10_000, 10_000_000),
        }
    }

    /// Built-in default, as a document token.
    pub fn default_token(self) -> &'static str {
        match self {
            CommField::Baudrate => "9600",
            CommField::Parity => "E",
            CommField::Stopbits => "1",
            CommField::Duplex => "HALF",
            CommField::Rxdelay
            | CommField::Txdelay
            | CommField::Drivedelay
            | CommField::Icdelay
            | CommField::Timeout => "AUTO",
            CommField::Interval | CommField::Suspend => "0",
            CommField::Writeflush => "1",
        }
    }

    fn accepts_auto(self) -> bool {
        matches!(
            self,
            CommField::Rxdelay
                | CommField::Txdelay
                | CommField::Drivedelay
                | CommField::Icdelay
                | CommField::Timeout
        )
    }

    /// Resolves a single token into its canonical integer.
    fn resolve(self, token: &str) -> Result<i128, String> {
        let token = token.trim();
        let value = match self {
            CommField::Parity => match token.to_ascii_uppercase().as_str() {
                "N" | "NONE" | "0" => 0,
                "O" | "ODD" | "1" => 1,
                "E" | "EVEN" | "2" => 2,
                _ => {
                    return Err(format!(
                        "Parity must be one of 'E', 'O' or 'N' (is set to '{}')",
                        token
                    ));
                }
            },
            CommField::Duplex => match token.to_ascii_uppercase().as_str() {
                "HALF" | "0" => 0,
                "FULL" | "1" => 1,
                _ => {
                    return Err(format!(
                        "Duplex must be 'full' or 'half' (is set to '{}')",
                        token
                    ));
                }
            },
            CommField::Suspend | CommField::Writeflush => match parse_bool(token) {
                Some(b) => i128::from(b),
                None => {
                    return Err(format!(
                        "Expected boolean value for '{}' (is set to '{}')",
                        self.name(),
                        token
                    ));
                }
            },
            _ if self.accepts_auto() && token.eq_ignore_ascii_case("AUTO") => 0,
            _ => parse_int(token).ok_or_else(|| {
                format!("Value '{}' for '{}' is not an integer", token, self.name())
            })?,
        };

        let (min, max) = self.limits();
        let auto_timeout = self == CommField::Timeout && value == 0;
        if !auto_timeout && (value < min || value > max) {
            return Err(format!(
                "Value for '{}' must be between {} and {} (is set to '{}')",
                self.name(),
                min,
                max,
                token
            ));
        }
        Ok(value)
    }
}

impl fmt::Display for CommField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A field that failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: CommField,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Unresolved communication settings: one string token per field.
///
/// Layers are applied with [`CommSettings::overlay`], the most specific
/// last, and turned into a [`CommParams`] with [`CommSettings::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommSettings {
    tokens: BTreeMap<CommField, String>,
}

impl Default for CommSettings {
    fn default() -> Self {
        Self {
            tokens: CommField::ALL
                .iter()
                .map(|&f| (f, f.default_token().to_string()))
                .collect(),
        }
    }
}

impl CommSettings {
    /// The built-in defaults.
    pub fn defaults() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CommField) -> Option<&str> {
        self.tokens.get(&field).map(String::as_str)
    }

    /// Returns a copy with every attribute that names one of `fields`
    /// replaced. Other attributes are ignored.
    pub fn overlay<'a>(
        &self,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
        fields: &[CommField],
    ) -> Self {
        let mut merged = self.clone();
        for (name, value) in attributes {
            if let Some(field) = CommField::from_name(name).filter(|f| fields.contains(f)) {
                merged.tokens.insert(field, value.to_string());
            }
        }
        merged
    }

    /// Resolves every field. All failing fields are reported.
    pub fn resolve(&self) -> Result<CommParams, Vec<FieldError>> {
        let mut values = BTreeMap::new();
        let mut errors = Vec::new();
        for field in CommField::ALL {
            let token = self.get(field).unwrap_or(field.default_token());
            match field.resolve(token) {
                Ok(v) => {
                    values.insert(field, v);
                }
                Err(message) => errors.push(FieldError { field, message }),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        // Every value below passed its range check.
        let get = |field: CommField| values.get(&field).copied().unwrap_or_default();
        Ok(CommParams {
            baudrate: get(CommField::Baudrate) as u32,
            parity: match get(CommField::Parity) {
                0 => Parity::None,
                1 => Parity::Odd,
                _ => Parity::Even,
            },
            stopbits: get(CommField::Stopbits) as u8,
            duplex: match get(CommField::Duplex) {
                0 => Duplex::Half,
                _ => Duplex::Full,
            },
            rxdelay: get(CommField::Rxdelay) as u16,
            txdelay: get(CommField::Txdelay) as u16,
            drivedelay: get(CommField::Drivedelay) as u16,
            icdelay: get(CommField::Icdelay) as u16,
            interval: get(CommField::Interval) as u32,
            suspend: get(CommField::Suspend) != 0,
            writeflush: get(CommField::Writeflush) != 0,
            timeout: get(CommField::Timeout) as u32,
        })
    }
}

/// Resolved communication parameters. Delays are in bit times, 0 = auto;
/// `interval` and `timeout` are in microseconds, timeout 0 = auto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommParams {
    pub baudrate: u32,
    pub parity: Parity,
    pub stopbits: u8,
    pub duplex: Duplex,
    pub rxdelay: u16,
    pub txdelay: u16,
    pub drivedelay: u16,
    pub icdelay: u16,
    pub interval: u32,
    pub suspend: bool,
    pub writeflush: bool,
    pub timeout: u32,
}

impl Default for CommParams {
    fn default() -> Self {
        Self {
            baudrate: 9600,
            parity: Parity::Even,
            stopbits: 1,
            duplex: Duplex::Half,
            rxdelay: 0,
            txdelay: 0,
            drivedelay: 0,
            icdelay: 0,
            interval: 0,
            suspend: false,
            writeflush: true,
            timeout: 0,
        }
    }
}

impl CommParams {
    /// Compares the fields an init list comms override can change.
    pub fn same_rate(&self, other: &CommParams) -> bool {
        self.baudrate == other.baudrate
            && self.parity == other.parity
            && self.stopbits == other.stopbits
            && self.rxdelay == other.rxdelay
            && self.txdelay == other.txdelay
            && self.drivedelay == other.drivedelay
            && self.icdelay == other.icdelay
    }

    /// Bits per character on the wire: start, 8 data, stop bits and parity.
    pub fn character_bits(&self) -> u32 {
        let parity = u32::from(self.parity != Parity::None);
        let extra_stop = u32::from(self.stopbits == 2);
        10 + parity + extra_stop
    }

    /// Serial format bits for the image header.
    pub fn format_flags(&self) -> FormatFlags {
        let mut flags = FormatFlags::empty();
        match self.parity {
            Parity::None => {}
            Parity::Odd => flags.insert(FormatFlags::PARITY_EN | FormatFlags::PARITY_ODD),
            Parity::Even => flags.insert(FormatFlags::PARITY_EN),
        }
        flags.set(FormatFlags::STOPBITS2, self.stopbits == 2);
        flags.set(FormatFlags::DUPLEX, self.duplex == Duplex::Full);
        flags.set(FormatFlags::SUSPEND, self.suspend);
        flags
    }

    /// Serial format bits as carried by a comms override record.
    pub fn override_flags(&self) -> CommandFlags {
        let mut flags = CommandFlags::empty();
        match self.parity {
            Parity::None => {}
            Parity::Odd => flags.insert(CommandFlags::PARITY_EN | CommandFlags::PARITY_ODD),
            Parity::Even => flags.insert(CommandFlags::PARITY_EN),
        }
        flags.set(CommandFlags::STOPBITS2, self.stopbits == 2);
        flags
    }
}
