//! Structured diagnostics
//!
//! Per-tag and per-line problems travel as data next to the successfully
//! processed tags; only whole-batch structural failures become errors.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-readable diagnostic kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// Source text could not be read as declarations at all
    Unparseable,
    /// A single declaration line could not be parsed
    PartialDeclaration,
    /// Tag name is not a legal identifier for the vendor
    InvalidName,
    /// I/O tag without a physical address
    AddressRequired,
    /// Address string violates the vendor grammar
    InvalidAddress,
    /// Data type has no equivalent for the vendor
    UntranslatableType,
    /// Address area cannot hold the declared data type
    IncompatibleAddress,
    /// Same name (case-insensitive) appears twice in one batch
    DuplicateName,
    /// Store rejected the write for this tag
    StoreConflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// 1-based source line or container row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Tag the diagnostic refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            line: None,
            tag: None,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn for_tag(mut self, name: impl Into<String>) -> Self {
        self.tag = Some(name.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        if let Some(tag) = &self.tag {
            write!(f, "{}: ", tag)?;
        }
        f.write_str(&self.message)
    }
}
