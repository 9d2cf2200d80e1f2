// src/lib.rs

#![no_std]
#![doc = "Compiles Mesa hostmot2 Modbus RTU schedules into binary mbccb images."]
#![doc = ""]
#![doc = "This `no_std + alloc` library takes a document that was already parsed into"]
#![doc = "a generic [`Element`] tree (see the `mbccb-rs-xml` crate) and produces:"]
#![doc = "- a resolved [`Schedule`]: devices, init records and cyclic commands with their pins,"]
#![doc = "- the binary [`Image`] consumed by the hm2_modbus state machine,"]
#![doc = "- every warning and error found on the way, as [`Diagnostics`]."]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// --- Crate Modules ---

mod attrs;
mod commands;
mod compiler;
mod config;
mod devices;
mod diag;
mod encode;
mod error;
mod image;
mod initlist;
mod schedule;
mod timeout;
mod tree;
pub mod types;

// --- Public API Re-exports ---

pub use attrs::{parse_bool, parse_float, parse_int};
pub use compiler::{Compilation, Compiler, compile};
pub use config::{CommField, CommParams, CommSettings, Duplex, FieldError, Parity};
pub use devices::{Device, DeviceRegistry};
pub use diag::{DIAGNOSTICS_TARGET, Diagnostic, Diagnostics, Severity};
pub use encode::{encode_float, encode_integer, f16_bits};
pub use error::MbccbError;
pub use image::{Codec, DataBlob, HEADER_SIZE, Header, Image, RECORD_SIZE, Record, SIGNATURE};
pub use schedule::{Command, CommandRecord, InitFrame, InitRecord, Listing, Pin, Schedule};
pub use timeout::{bits_to_micros, estimate_timeout, frame_bytes};
pub use tree::Element;
pub use types::{
    ByteOrder, CommandFlags, FormatFlags, Function, HalType, ModbusType, PinFlags, ValueKind,
};
