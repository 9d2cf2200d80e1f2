// src/lib.rs

#![no_std]
#![doc = "Reads `<mesamodbus>` XML documents into `mbccb-rs` element trees."]
#![doc = ""]
#![doc = "This `no_std + alloc` library is the text front-end of the compiler: it"]
#![doc = "turns XML into a generic [`mbccb_rs::Element`] tree and reports markup"]
#![doc = "errors. Everything after that (defaults, devices, init list, commands,"]
#![doc = "image layout) happens in `mbccb-rs`."]
#![doc = ""]
#![doc = "- `parse_document`: XML text to element tree."]
#![doc = "- `compile_str`: XML text straight to a compiled image."]

extern crate alloc;

// --- Crate Modules ---

mod error;
mod parser;

// --- Public API Re-exports ---

pub use error::{CompileError, XmlError};
pub use parser::{compile_str, parse_document};
