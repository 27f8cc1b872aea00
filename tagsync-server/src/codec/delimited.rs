//! Delimited tag tables (CSV family)
//!
//! Encoding follows the vendor's own table layout. Decoding is header
//! driven and sniffs the delimiter, so a hand-made `name,type,address`
//! sheet imports as well as a tool export. Rockwell `remark` preamble
//! rows and non-tag `TYPE` rows are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use tagsync_common::CanonicalTag;

use super::{CodecError, Decoded, Location, RowFields};
use crate::vendor::VendorDialect;

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+)\s*:=\s*('(?:[^']|'')*'|[^,)]*)").expect("attribute regex")
});

/// Semantic meaning of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Record type (`TAG`, `ALIAS`, `COMMENT`, ...)
    RecordKind,
    /// Program container; empty for controller scope
    Program,
    /// Tag table path
    Path,
    Name,
    Description,
    DataType,
    Address,
    /// `(Usage := Input, Default := 0)` attribute list
    Attributes,
    Default,
    Usage,
}

/// Column order and preamble of a vendor table
#[derive(Debug)]
pub struct TableLayout {
    pub delimiter: u8,
    pub preamble: &'static [&'static [&'static str]],
    pub columns: &'static [(Column, &'static str)],
}

// ========================================
// Encoding
// ========================================

pub fn encode(
    dialect: &dyn VendorDialect,
    layout: &TableLayout,
    tags: &[CanonicalTag],
) -> Result<Vec<u8>, CodecError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(layout.delimiter)
        .flexible(true)
        .from_writer(Vec::new());

    for row in layout.preamble {
        writer.write_record(*row).map_err(write_error)?;
    }
    writer
        .write_record(layout.columns.iter().map(|(_, header)| *header))
        .map_err(write_error)?;

    for tag in tags {
        let record: Vec<String> = layout
            .columns
            .iter()
            .map(|(column, _)| cell(dialect, tag, *column))
            .collect();
        writer.write_record(&record).map_err(write_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| CodecError::Write(e.to_string()))
}

fn write_error(e: csv::Error) -> CodecError {
    CodecError::Write(e.to_string())
}

fn cell(dialect: &dyn VendorDialect, tag: &CanonicalTag, column: Column) -> String {
    match column {
        Column::RecordKind => "TAG".to_string(),
        Column::Program => String::new(),
        Column::Path => "Default tag table".to_string(),
        Column::Name => tag.name.clone(),
        Column::Description => tag.description.clone(),
        Column::DataType => dialect.type_name(tag.data_type).to_string(),
        Column::Address => dialect.container_address(&tag.address),
        Column::Attributes => {
            let mut attributes = format!("(Usage := {}", dialect.scope_keyword(tag.scope));
            if !tag.default_value.is_empty() {
                attributes.push_str(", Default := ");
                attributes.push_str(&quote_attribute(&tag.default_value));
            }
            attributes.push(')');
            attributes
        }
        Column::Default => tag.default_value.clone(),
        Column::Usage => dialect.scope_keyword(tag.scope).to_string(),
    }
}

fn quote_attribute(value: &str) -> String {
    if value.contains(&[',', ')', '\''][..]) {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_string()
    }
}

// ========================================
// Decoding
// ========================================

pub fn decode(dialect: &dyn VendorDialect, bytes: &[u8]) -> Result<Decoded, CodecError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CodecError::malformed(Location::Document, format!("not UTF-8: {}", e)))?;
    let text = text.trim_start_matches('\u{feff}');

    // Skip the preamble up to the header row
    let mut offset = 0;
    let mut header_line = None;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_remark(trimmed) || is_version(trimmed) {
            offset += line.len();
            continue;
        }
        header_line = Some(index + 1);
        break;
    }
    let Some(header_line) = header_line else {
        return Err(CodecError::malformed(Location::Document, "no header row"));
    };

    let body = &text[offset..];
    let delimiter = sniff_delimiter(body.lines().next().unwrap_or_default());
    let physical_line = |line: u64| line as usize + header_line - 1;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(Ok(header)) => header,
        Some(Err(e)) => return Err(CodecError::malformed(Location::Row(header_line), e.to_string())),
        None => return Err(CodecError::malformed(Location::Document, "no header row")),
    };
    let columns = HeaderMap::new(&header)
        .map_err(|message| CodecError::malformed(Location::Row(header_line), message))?;

    let mut decoded = Decoded::default();
    for result in records {
        let record = result.map_err(|e| {
            let row = e
                .position()
                .map(|p| physical_line(p.line()))
                .unwrap_or(header_line);
            CodecError::malformed(Location::Row(row), e.to_string())
        })?;
        let row = record
            .position()
            .map(|p| physical_line(p.line()))
            .unwrap_or(header_line);

        if record.iter().all(str::is_empty) {
            continue;
        }
        if let Some(kind) = columns.get(&record, Column::RecordKind) {
            if !kind.eq_ignore_ascii_case("TAG") && !kind.eq_ignore_ascii_case("ALIAS") {
                continue;
            }
        }

        let name = columns.get(&record, Column::Name).unwrap_or_default();
        if name.is_empty() {
            return Err(CodecError::malformed(Location::Row(row), "empty tag name"));
        }

        let attributes = columns
            .get(&record, Column::Attributes)
            .map(parse_attributes)
            .unwrap_or_default();
        let attribute = |key: &str| {
            attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone())
        };
        let column_or_attribute = |column: Column, key: &str| {
            columns
                .get(&record, column)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| attribute(key))
                .unwrap_or_default()
        };

        let fields = RowFields {
            name: name.to_string(),
            type_name: columns.get(&record, Column::DataType).unwrap_or_default().to_string(),
            address: columns.get(&record, Column::Address).unwrap_or_default().to_string(),
            scope: column_or_attribute(Column::Usage, "Usage"),
            default_value: column_or_attribute(Column::Default, "Default"),
            description: columns
                .get(&record, Column::Description)
                .unwrap_or_default()
                .to_string(),
        };
        decoded.push_fields(dialect, fields, Some(row));
    }

    Ok(decoded)
}

fn is_remark(line: &str) -> bool {
    line.trim_start_matches('"')
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("remark"))
        .unwrap_or(false)
}

/// Rockwell's bare `0.3` format version line
fn is_version(line: &str) -> bool {
    line.trim_matches('"').parse::<f64>().is_ok()
}

/// Most frequent of `,` `;` and tab outside quotes; `,` on ties
fn sniff_delimiter(header: &str) -> u8 {
    let mut counts = [(b',', 0usize), (b';', 0), (b'\t', 0)];
    let mut quoted = false;
    for byte in header.bytes() {
        if byte == b'"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        if let Some(entry) = counts.iter_mut().find(|(d, _)| *d == byte) {
            entry.1 += 1;
        }
    }
    counts
        .iter()
        .fold((b',', 0), |best, &(d, n)| if n > best.1 { (d, n) } else { best })
        .0
}

fn parse_attributes(text: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(text)
        .map(|caps| {
            let raw = caps[2].trim();
            let value = if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
                raw[1..raw.len() - 1].replace("''", "'")
            } else {
                raw.to_string()
            };
            (caps[1].to_string(), value)
        })
        .collect()
}

/// Column positions resolved from a header record
struct HeaderMap {
    columns: Vec<Option<Column>>,
}

impl HeaderMap {
    fn new(header: &csv::StringRecord) -> Result<Self, String> {
        let keys: Vec<String> = header.iter().map(header_key).collect();
        // Rockwell tables use TYPE for the record kind next to DATATYPE
        let has_record_kind =
            keys.iter().any(|k| k == "type") && keys.iter().any(|k| k == "datatype");

        let columns: Vec<Option<Column>> = keys
            .iter()
            .map(|key| classify(key, has_record_kind))
            .collect();

        for (required, label) in [(Column::Name, "name"), (Column::DataType, "data type")] {
            if !columns.contains(&Some(required)) {
                return Err(format!("missing required column '{}'", label));
            }
        }

        Ok(Self { columns })
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        let index = self.columns.iter().position(|c| *c == Some(column))?;
        Some(record.get(index).unwrap_or_default())
    }
}

fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase()
}

fn classify(key: &str, has_record_kind: bool) -> Option<Column> {
    Some(match key {
        "name" | "tagname" | "tag" | "symbol" | "variable" => Column::Name,
        "datatype" | "datatypename" => Column::DataType,
        "type" if has_record_kind => Column::RecordKind,
        "type" => Column::DataType,
        "address" | "specifier" | "logicaladdress" | "ioaddress" | "location" => Column::Address,
        "description" | "comment" => Column::Description,
        "default" | "defaultvalue" | "initvalue" | "initialvalue" | "startvalue" => Column::Default,
        "scope" if has_record_kind => Column::Program,
        "scope" | "usage" => Column::Usage,
        "attributes" => Column::Attributes,
        "path" => Column::Path,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ContainerFormat;
    use crate::vendor::dialect;
    use tagsync_common::{Category, DataType, DiagnosticCode, Scope, Vendor};

    fn decode_as(vendor: Vendor, text: &str) -> Result<Decoded, CodecError> {
        dialect(vendor).decode(text.as_bytes(), ContainerFormat::Csv)
    }

    #[test]
    fn test_rockwell_export_layout() {
        let mut tag = CanonicalTag::new("Motor_Output", DataType::Bool, Vendor::Rockwell);
        tag.address = "O:2/0".to_string();
        tag.scope = Scope::Output;
        tag.category = Category::Output;
        tag.default_value = "0".to_string();

        let bytes = dialect(Vendor::Rockwell)
            .encode(&[tag], ContainerFormat::Csv)
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "remark,CSV-Import-Export");
        assert_eq!(lines[2], "0.3");
        assert_eq!(lines[3], "TYPE,SCOPE,NAME,DESCRIPTION,DATATYPE,SPECIFIER,ATTRIBUTES");
        assert_eq!(
            lines[4],
            "TAG,,Motor_Output,,BOOL,O:2/0,\"(Usage := Output, Default := 0)\""
        );
    }

    #[test]
    fn test_rockwell_import_skips_preamble_and_comments() {
        let text = "\
remark,\"CSV-Import-Export\"
0.3
TYPE,SCOPE,NAME,DESCRIPTION,DATATYPE,SPECIFIER,ATTRIBUTES
TAG,,Start_Button,\"Green, big\",BOOL,I:1/0,\"(Usage := Input)\"
COMMENT,,Start_Button,,,,
ALIAS,,Lamp,,BOOL,O:2/1,
";
        let decoded = decode_as(Vendor::Rockwell, text).unwrap();
        assert!(decoded.issues.is_empty());
        assert_eq!(decoded.tags.len(), 2);
        assert_eq!(decoded.tags[0].description, "Green, big");
        assert_eq!(decoded.tags[0].scope, Scope::Input);
        assert_eq!(decoded.tags[0].category, Category::Input);
        assert_eq!(decoded.tags[1].name, "Lamp");
        assert_eq!(decoded.tags[1].category, Category::Output);
    }

    #[test]
    fn test_siemens_addresses_lose_percent() {
        let text = "Name,Path,Data Type,Logical Address,Comment\nStart,Default tag table,Bool,%I0.0,\n";
        let decoded = decode_as(Vendor::Siemens, text).unwrap();
        assert_eq!(decoded.tags[0].address, "I0.0");
        assert_eq!(decoded.tags[0].data_type, DataType::Bool);
    }

    #[test]
    fn test_semicolon_table_is_sniffed() {
        let text = "Name;Type;Address\nLamp;BOOL;%QX0.0\nSpeed;INT;%MW2\n";
        let decoded = decode_as(Vendor::Beckhoff, text).unwrap();
        assert_eq!(decoded.tags.len(), 2);
        assert_eq!(decoded.tags[1].address, "%MW2");
        assert_eq!(decoded.tags[1].category, Category::Memory);
    }

    #[test]
    fn test_plain_sheet_for_any_vendor() {
        let text = "name,type,address\nMotor_Output,BOOL,O:2/0\n";
        let decoded = decode_as(Vendor::Rockwell, text).unwrap();
        assert_eq!(decoded.tags[0].address, "O:2/0");
        assert_eq!(decoded.tags[0].scope, Scope::Local);
    }

    #[test]
    fn test_unknown_type_is_a_row_issue() {
        let text = "name,type\nGood,BOOL\nOdd,LREAL\n";
        let decoded = decode_as(Vendor::Beckhoff, text).unwrap();
        assert_eq!(decoded.tags.len(), 1);
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.issues[0].code, DiagnosticCode::UntranslatableType);
        assert_eq!(decoded.issues[0].line, Some(3));
    }

    #[test]
    fn test_empty_name_fails_whole_table() {
        let text = "name,type\nGood,BOOL\n,INT\n";
        let err = decode_as(Vendor::Beckhoff, text).unwrap_err();
        assert_eq!(err.location(), Some(&Location::Row(3)));
    }

    #[test]
    fn test_missing_columns() {
        let err = decode_as(Vendor::Beckhoff, "address,comment\n%IX0.0,x\n").unwrap_err();
        assert_eq!(err.location(), Some(&Location::Row(1)));
        assert!(err.to_string().contains("missing required column 'name'"));
    }

    #[test]
    fn test_not_utf8() {
        let err = dialect(Vendor::Siemens)
            .decode(&[0xff, 0xfe, 0x00], ContainerFormat::Csv)
            .unwrap_err();
        assert_eq!(err.location(), Some(&Location::Document));
    }

    #[test]
    fn test_attribute_quoting() {
        assert_eq!(quote_attribute("a,b"), "'a,b'");
        let parsed = parse_attributes("(Usage := Local, Default := 'it''s, ok')");
        assert_eq!(parsed[1], ("Default".to_string(), "it's, ok".to_string()));
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("a\tb"), b'\t');
        assert_eq!(sniff_delimiter("\"a;b\",c"), b',');
        assert_eq!(sniff_delimiter("name"), b',');
    }
}
