//! Bulk codecs
//!
//! Vendor import/export containers. Each vendor has a delimited table
//! layout and an XML document format; the dialect picks the right one.
//!
//! Decoding is strict about structure (a malformed container fails as a
//! whole with its location) and lenient about content: rows whose type
//! the vendor does not know are skipped with a per-row diagnostic, and
//! address validation is left to the importer.

pub mod delimited;
pub mod l5x;
pub mod plcopen;
pub mod tia_xml;
mod xml;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tagsync_common::{
    CanonicalTag, Category, Diagnostic, DiagnosticCode, ProjectId, Scope, Vendor,
};
use thiserror::Error;

use crate::vendor::VendorDialect;

/// Container family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Csv,
    Xml,
}

impl ContainerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerFormat::Csv => "csv",
            ContainerFormat::Xml => "xml",
        }
    }

    /// Guess the format from the first non-blank byte
    pub fn sniff(bytes: &[u8]) -> Self {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => ContainerFormat::Xml,
            _ => ContainerFormat::Csv,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ContainerFormat::Csv => "text/csv; charset=utf-8",
            ContainerFormat::Xml => "application/xml",
        }
    }

    /// Download file name for an export
    pub fn file_name(&self, vendor: Vendor, project_id: ProjectId) -> String {
        let extension = match (self, vendor) {
            (ContainerFormat::Csv, _) => "csv",
            (ContainerFormat::Xml, Vendor::Rockwell) => "L5X",
            (ContainerFormat::Xml, _) => "xml",
        };
        format!("project-{}-{}-tags.{}", project_id, vendor, extension)
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerFormat {
    type Err = tagsync_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Ok(ContainerFormat::Csv),
            "xml" | "l5x" | "plcopen" | "tia" => Ok(ContainerFormat::Xml),
            other => Err(tagsync_common::Error::InvalidInput(format!(
                "Unknown container format: {}",
                other
            ))),
        }
    }
}

// ========================================
// Errors
// ========================================

/// Where in a container a problem was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Document,
    /// 1-based physical line of a delimited table
    Row(usize),
    /// Element path inside an XML document
    Element(String),
    /// Byte offset of an XML syntax error
    Offset(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Document => f.write_str("document"),
            Location::Row(row) => write!(f, "row {}", row),
            Location::Element(path) => write!(f, "element {}", path),
            Location::Offset(offset) => write!(f, "byte {}", offset),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed container at {location}: {message}")]
    Malformed { location: Location, message: String },

    #[error("failed to write container: {0}")]
    Write(String),
}

impl CodecError {
    pub fn malformed(location: Location, message: impl Into<String>) -> Self {
        CodecError::Malformed {
            location,
            message: message.into(),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            CodecError::Malformed { location, .. } => Some(location),
            CodecError::Write(_) => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(DiagnosticCode::Unparseable, self.to_string());
        match self.location() {
            Some(Location::Row(row)) => diagnostic.at_line(*row),
            _ => diagnostic,
        }
    }
}

// ========================================
// Decoded Output
// ========================================

/// Tags read from a container plus per-row issues
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub tags: Vec<CanonicalTag>,
    pub issues: Vec<Diagnostic>,
}

/// Raw text fields of one container entry
#[derive(Debug, Clone, Default)]
pub(crate) struct RowFields {
    pub name: String,
    pub type_name: String,
    pub address: String,
    pub scope: String,
    pub default_value: String,
    pub description: String,
}

impl Decoded {
    /// Turn one entry into a canonical tag, or record why it cannot be
    pub(crate) fn push_fields(
        &mut self,
        dialect: &dyn VendorDialect,
        fields: RowFields,
        line: Option<usize>,
    ) {
        let vendor = dialect.vendor();
        let name = fields.name.trim().to_string();
        let at = |diagnostic: Diagnostic| match line {
            Some(line) => diagnostic.at_line(line).for_tag(&name),
            None => diagnostic.for_tag(&name),
        };

        let Some(data_type) = dialect.parse_type(&fields.type_name) else {
            self.issues.push(at(Diagnostic::error(
                DiagnosticCode::UntranslatableType,
                format!("{} has no data type '{}'", vendor, fields.type_name.trim()),
            )));
            return;
        };

        let scope = if fields.scope.trim().is_empty() {
            Scope::Local
        } else {
            dialect.parse_scope(&fields.scope).unwrap_or_else(|| {
                self.issues.push(at(Diagnostic::warning(
                    DiagnosticCode::UntranslatableType,
                    format!("unknown usage '{}', treated as local", fields.scope.trim()),
                )));
                Scope::Local
            })
        };

        let address = dialect.address_from_container(&fields.address);
        let area = dialect.parse_address(&address).ok().and_then(|p| p.area);

        self.tags.push(CanonicalTag {
            name,
            data_type,
            address,
            scope,
            category: Category::infer(scope, area),
            default_value: fields.default_value.trim().to_string(),
            description: fields.description.trim().to_string(),
            vendor,
            is_generated: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_format() {
        assert_eq!(ContainerFormat::sniff(b"  <?xml version=\"1.0\"?>"), ContainerFormat::Xml);
        assert_eq!(ContainerFormat::sniff(b"\xEF\xBB\xBF<project/>"), ContainerFormat::Xml);
        assert_eq!(ContainerFormat::sniff(b"Name,Type\n"), ContainerFormat::Csv);
        assert_eq!(ContainerFormat::sniff(b""), ContainerFormat::Csv);
    }

    #[test]
    fn test_format_names() {
        assert_eq!("L5X".parse::<ContainerFormat>().unwrap(), ContainerFormat::Xml);
        assert!("json".parse::<ContainerFormat>().is_err());
        assert_eq!(
            ContainerFormat::Xml.file_name(Vendor::Rockwell, 7),
            "project-7-rockwell-tags.L5X"
        );
    }

    #[test]
    fn test_row_error_keeps_line() {
        let err = CodecError::malformed(Location::Row(4), "empty tag name");
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.line, Some(4));
        assert!(diagnostic.message.contains("row 4"));
    }
}
