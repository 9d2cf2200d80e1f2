// crates/mbccb-rs-cli/src/app.rs

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use mbccb_rs::{Compilation, Diagnostics};
use mbccb_rs_xml::compile_str;

use crate::cli::Cli;
use crate::error::CliError;

/// What a successful run produced.
#[derive(Debug)]
pub struct Outcome {
    pub compilation: Compilation,
    /// The image file, unless `--check` was given.
    pub written: Option<PathBuf>,
}

/// Compiles the input named by `cli`, prints the requested reports to
/// `out` and writes the image.
///
/// Every diagnostic goes to `diag` as `input.xml: error: message (path)`,
/// whether or not the document is accepted. Nothing is written when the
/// document has errors.
pub fn run<W: Write, D: Write>(
    cli: &Cli,
    out: &mut W,
    diag: &mut D,
) -> Result<Outcome, CliError> {
    let xml = fs::read_to_string(&cli.input).map_err(|source| CliError::Read {
        path: cli.input.clone(),
        source,
    })?;
    let compilation = match compile_str(&xml) {
        Ok(compilation) => compilation,
        Err(e) => {
            let e = CliError::from(e);
            if let CliError::Rejected(diagnostics) = &e {
                report(&cli.input, diagnostics, diag)?;
            }
            return Err(e);
        }
    };
    report(&cli.input, &compilation.diagnostics, diag)?;

    if cli.verbose {
        write!(out, "{}", compilation.schedule.listing())?;
        let image = &compilation.image;
        writeln!(out, "Init records   : {}", image.init_records())?;
        writeln!(out, "Command records: {}", image.command_records())?;
        writeln!(out, "Pins           : {}", image.pin_count())?;
        writeln!(out, "Data fragments : {}", image.data_fragments())?;
        writeln!(out, "Image size     : {} bytes", image.len())?;
    }
    if cli.json {
        serde_json::to_writer_pretty(&mut *out, &compilation.schedule)?;
        writeln!(out)?;
    }

    let written = if cli.check {
        None
    } else {
        fs::write(&cli.output, compilation.image.as_bytes()).map_err(|source| {
            CliError::Write {
                path: cli.output.clone(),
                source,
            }
        })?;
        info!(
            "Wrote {} bytes to '{}'",
            compilation.image.len(),
            cli.output.display()
        );
        Some(cli.output.clone())
    };

    Ok(Outcome {
        compilation,
        written,
    })
}

fn report<D: Write>(
    input: &Path,
    diagnostics: &Diagnostics,
    diag: &mut D,
) -> Result<(), CliError> {
    for d in diagnostics {
        writeln!(diag, "{}: {}", input.display(), d)?;
    }
    Ok(())
}
