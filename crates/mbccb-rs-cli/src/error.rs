// crates/mbccb-rs-cli/src/error.rs

use std::fmt;
use std::io;
use std::path::PathBuf;

use mbccb_rs::{Diagnostics, MbccbError};
use mbccb_rs_xml::{CompileError, XmlError};

/// Errors that end a `mesambccc` run with exit code 1.
#[derive(Debug)]
pub enum CliError {
    /// The input file could not be read.
    Read { path: PathBuf, source: io::Error },

    /// The image could not be written.
    Write { path: PathBuf, source: io::Error },

    /// The listing or JSON could not be written to the console.
    Output(io::Error),

    /// The input is not well-formed XML.
    Xml(XmlError),

    /// The document has errors. Every diagnostic has been reported already.
    Rejected(Diagnostics),

    /// The document was accepted but could not be laid out.
    Image(MbccbError),

    /// The schedule could not be serialized as JSON.
    Json(serde_json::Error),
}

impl From<CompileError> for CliError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::Xml(e) => CliError::Xml(e),
            CompileError::Compile(MbccbError::Rejected(diags)) => CliError::Rejected(diags),
            CompileError::Compile(e) => CliError::Image(e),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Output(e)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Read { path, source } => {
                write!(f, "Cannot read '{}': {}", path.display(), source)
            }
            CliError::Write { path, source } => {
                write!(f, "Cannot write '{}': {}", path.display(), source)
            }
            CliError::Output(e) => write!(f, "Console output failed: {}", e),
            CliError::Xml(e) => write!(f, "{}", e),
            CliError::Rejected(diags) => write!(
                f,
                "{} error(s), {} warning(s); no output written",
                diags.error_count(),
                diags.warning_count()
            ),
            CliError::Image(e) => write!(f, "{}", e),
            CliError::Json(e) => write!(f, "JSON output failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Read { source, .. } | CliError::Write { source, .. } => Some(source),
            CliError::Output(e) => Some(e),
            CliError::Image(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Xml(_) | CliError::Rejected(_) => None,
        }
    }
}
