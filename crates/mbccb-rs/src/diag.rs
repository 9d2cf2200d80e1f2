// src/diag.rs

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use serde::Serialize;

/// `log` target every diagnostic is traced under.
pub const DIAGNOSTICS_TARGET: &str = "mbccb::diagnostics";

/// How serious a diagnostic is.
///
/// Errors suppress the output image; warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single message produced while compiling, located by a structural path
/// such as `commands/command[3]/pin[2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        if self.path.is_empty() {
            write!(f, "{}: {}", label, self.message)
        } else {
            write!(f, "{}: {} ({})", label, self.message, self.path)
        }
    }
}

/// Ordered list of every diagnostic of one compilation.
///
/// Entries are never deduplicated or truncated. Each push is also traced on
/// [`DIAGNOSTICS_TARGET`]; callers report the entries themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fatal diagnostic.
    pub fn error(&mut self, path: &str, message: impl Into<String>) {
        self.push(Severity::Error, path, message.into());
    }

    /// Records an advisory diagnostic.
    pub fn warning(&mut self, path: &str, message: impl Into<String>) {
        self.push(Severity::Warning, path, message.into());
    }

    fn push(&mut self, severity: Severity, path: &str, message: String) {
        let entry = Diagnostic {
            severity,
            path: String::from(path),
            message,
        };
        log::trace!(target: DIAGNOSTICS_TARGET, "{}", entry);
        self.entries.push(entry);
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = core::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Marker returned when a record was rejected.
///
/// The reason has already been pushed into the diagnostics, so callers only
/// skip the record and carry on with its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Skip;
