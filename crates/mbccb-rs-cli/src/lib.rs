// src/lib.rs

#![doc = "The `mesambccc` command-line compiler."]
#![doc = ""]
#![doc = "Reads a `<mesamodbus>` XML file, reports every diagnostic and writes the"]
#![doc = "binary mbccb image when the document has no errors."]

// --- Crate Modules ---

mod app;
mod cli;
mod error;

// --- Public API Re-exports ---

pub use app::{Outcome, run};
pub use cli::{Cli, DEFAULT_OUTPUT};
pub use error::CliError;
