// crates/mbccb-rs-cli/src/cli.rs

//! Command-line arguments of `mesambccc`.

use std::path::PathBuf;

use clap::Parser;

/// Image file written when `--output` is not given.
pub const DEFAULT_OUTPUT: &str = "mesamodbus.output.mbccb";

/// Compiles a `<mesamodbus>` XML schedule into the binary mbccb image
/// loaded by the hm2_modbus driver.
#[derive(Parser, Debug, Clone)]
#[command(name = "mesambccc", version, about, long_about = None)]
pub struct Cli {
    /// Input XML file
    pub input: PathBuf,

    /// Output image file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Print the resolved schedule and image statistics
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the resolved schedule as JSON
    #[arg(long)]
    pub json: bool,

    /// Only validate the input; no image is written
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose { "info" } else { "warn" }
    }
}
