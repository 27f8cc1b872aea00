//! PLCopen TC6 XML (TwinCAT / CODESYS exchange format)
//!
//! Tags are written as the interface of a single `Tags` program. One
//! variable list element is emitted per run of equally scoped tags so the
//! document keeps the original tag order. On import every variable list in
//! the document is read, including configuration-level `globalVars`.

use chrono::Utc;
use tagsync_common::{CanonicalTag, Scope};

use super::xml::{self, Element, XmlWriter};
use super::{CodecError, Decoded, Location, RowFields};
use crate::vendor::VendorDialect;

const NAMESPACE: &str = "http://www.plcopen.org/xml/tc6_0200";
const XHTML: &str = "http://www.w3.org/1999/xhtml";

/// Type names written as empty elements (`<BOOL/>`)
const ELEMENTARY: &[&str] = &["BOOL", "INT", "DINT", "REAL"];

/// Variable list element and the canonical scope it carries
const VAR_LISTS: &[(&str, &str)] = &[
    ("inputVars", "input"),
    ("outputVars", "output"),
    ("localVars", "local"),
    ("tempVars", "local"),
    ("inOutVars", "local"),
    ("globalVars", "global"),
    ("externalVars", "global"),
];

fn var_list(scope: Scope) -> &'static str {
    match scope {
        Scope::Input => "inputVars",
        Scope::Output => "outputVars",
        Scope::Local => "localVars",
        Scope::Global => "globalVars",
    }
}

pub fn encode(dialect: &dyn VendorDialect, tags: &[CanonicalTag]) -> Result<Vec<u8>, CodecError> {
    let created = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let mut w = XmlWriter::new();

    w.declaration(None)?;
    w.start("project", &[("xmlns", NAMESPACE)])?;
    w.empty(
        "fileHeader",
        &[
            ("companyName", "tagsync"),
            ("productName", "tagsync"),
            ("productVersion", env!("CARGO_PKG_VERSION")),
            ("creationDateTime", created.as_str()),
        ],
    )?;
    w.start("contentHeader", &[("name", "Tags")])?;
    w.start("coordinateInfo", &[])?;
    for language in ["fbd", "ld", "sfc"] {
        w.start(language, &[])?;
        w.empty("scaling", &[("x", "1"), ("y", "1")])?;
        w.end(language)?;
    }
    w.end("coordinateInfo")?;
    w.end("contentHeader")?;

    w.start("types", &[])?;
    w.empty("dataTypes", &[])?;
    w.start("pous", &[])?;
    w.start("pou", &[("name", "Tags"), ("pouType", "program")])?;
    w.start("interface", &[])?;

    for run in tags.chunk_by(|a, b| a.scope == b.scope) {
        let list = var_list(run[0].scope);
        w.start(list, &[])?;
        for tag in run {
            write_variable(&mut w, dialect, tag)?;
        }
        w.end(list)?;
    }

    w.end("interface")?;
    w.end("pou")?;
    w.end("pous")?;
    w.end("types")?;
    w.start("instances", &[])?;
    w.empty("configurations", &[])?;
    w.end("instances")?;
    w.end("project")?;
    Ok(w.finish())
}

fn write_variable(
    w: &mut XmlWriter,
    dialect: &dyn VendorDialect,
    tag: &CanonicalTag,
) -> Result<(), CodecError> {
    let address = dialect.container_address(&tag.address);
    let mut attributes = vec![("name", tag.name.as_str())];
    if !address.is_empty() {
        attributes.push(("address", address.as_str()));
    }
    w.start("variable", &attributes)?;

    let type_name = dialect.type_name(tag.data_type);
    w.start("type", &[])?;
    if type_name.eq_ignore_ascii_case("STRING") {
        w.empty("string", &[])?;
    } else if ELEMENTARY.contains(&type_name) {
        w.empty(type_name, &[])?;
    } else {
        w.empty("derived", &[("name", type_name)])?;
    }
    w.end("type")?;

    if !tag.default_value.is_empty() {
        w.start("initialValue", &[])?;
        w.empty("simpleValue", &[("value", tag.default_value.as_str())])?;
        w.end("initialValue")?;
    }

    if !tag.description.is_empty() {
        w.start("documentation", &[])?;
        w.start("xhtml", &[("xmlns", XHTML)])?;
        w.cdata(&tag.description)?;
        w.end("xhtml")?;
        w.end("documentation")?;
    }

    w.end("variable")
}

pub fn decode(dialect: &dyn VendorDialect, bytes: &[u8]) -> Result<Decoded, CodecError> {
    let root = xml::parse(bytes)?;
    if root.name != "project" {
        return Err(CodecError::malformed(
            Location::Element(root.name.clone()),
            "expected PLCopen <project> root",
        ));
    }

    let mut decoded = Decoded::default();
    read_lists(dialect, &root, "project", &mut decoded)?;
    Ok(decoded)
}

/// Walk the tree in document order, reading every variable list
fn read_lists(
    dialect: &dyn VendorDialect,
    element: &Element,
    path: &str,
    decoded: &mut Decoded,
) -> Result<(), CodecError> {
    for (index, child) in element.children.iter().enumerate() {
        let child_path = format!("{}/{}[{}]", path, child.name, index + 1);
        match VAR_LISTS.iter().find(|(list, _)| *list == child.name) {
            Some((_, scope)) => read_variables(dialect, child, scope, &child_path, decoded)?,
            None => read_lists(dialect, child, &child_path, decoded)?,
        }
    }
    Ok(())
}

fn read_variables(
    dialect: &dyn VendorDialect,
    list: &Element,
    scope: &str,
    path: &str,
    decoded: &mut Decoded,
) -> Result<(), CodecError> {
    for (index, variable) in list.children_named("variable").enumerate() {
        let location = || Location::Element(format!("{}/variable[{}]", path, index + 1));

        let name = variable
            .attr("name")
            .ok_or_else(|| CodecError::malformed(location(), "variable without name"))?;
        let type_name = variable
            .child("type")
            .and_then(|t| t.children.first())
            .map(vendor_type_name)
            .ok_or_else(|| CodecError::malformed(location(), "variable without type"))?;

        let default_value = variable
            .child("initialValue")
            .and_then(|v| v.child("simpleValue"))
            .and_then(|v| v.attr("value"))
            .unwrap_or_default();

        let description = variable
            .child("documentation")
            .map(|doc| match doc.child("xhtml") {
                Some(xhtml) => xhtml.text.trim(),
                None => doc.text.trim(),
            })
            .unwrap_or_default();

        decoded.push_fields(
            dialect,
            RowFields {
                name: name.to_string(),
                type_name,
                address: variable.attr("address").unwrap_or_default().to_string(),
                scope: scope.to_string(),
                default_value: default_value.to_string(),
                description: description.to_string(),
            },
            None,
        );
    }
    Ok(())
}

/// Vendor type name carried by a `<type>` child element
fn vendor_type_name(element: &Element) -> String {
    match element.name.as_str() {
        "derived" => element.attr("name").unwrap_or_default().to_string(),
        "string" | "wstring" => "STRING".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::dialect;
    use tagsync_common::{Category, DataType, DiagnosticCode, Vendor};

    fn beckhoff() -> &'static dyn VendorDialect {
        dialect(Vendor::Beckhoff)
    }

    fn tag(name: &str, data_type: DataType, scope: Scope, address: &str) -> CanonicalTag {
        let mut tag = CanonicalTag::new(name, data_type, Vendor::Beckhoff);
        tag.scope = scope;
        tag.address = address.to_string();
        tag
    }

    #[test]
    fn test_encode_keeps_order_with_scope_runs() {
        let tags = vec![
            tag("Start", DataType::Bool, Scope::Input, "%IX0.0"),
            tag("Count", DataType::Int16, Scope::Local, ""),
            tag("Stop", DataType::Bool, Scope::Input, "%IX0.1"),
        ];
        let text = String::from_utf8(encode(beckhoff(), &tags).unwrap()).unwrap();

        assert_eq!(text.matches("<inputVars>").count(), 2);
        assert_eq!(text.matches("<localVars>").count(), 1);
        let start = text.find(r#"name="Start""#).unwrap();
        let count = text.find(r#"name="Count""#).unwrap();
        let stop = text.find(r#"name="Stop""#).unwrap();
        assert!(start < count && count < stop);
        assert!(text.contains(r#"<variable name="Start" address="%IX0.0">"#));
        assert!(text.contains("<BOOL/>"));
    }

    #[test]
    fn test_encode_derived_and_string_types() {
        let mut timer = tag("Delay", DataType::Timer, Scope::Local, "");
        timer.description = "On delay".to_string();
        let mut text_tag = tag("Label", DataType::String, Scope::Global, "");
        text_tag.default_value = "'idle'".to_string();

        let text = String::from_utf8(encode(beckhoff(), &[timer, text_tag]).unwrap()).unwrap();
        assert!(text.contains(r#"<derived name="TON"/>"#));
        assert!(text.contains("<string/>"));
        assert!(text.contains("<globalVars>"));
        assert!(text.contains("On delay"));
    }

    #[test]
    fn test_decode_twincat_export() {
        let doc = br#"<?xml version="1.0" encoding="utf-8"?>
<project xmlns="http://www.plcopen.org/xml/tc6_0200">
  <fileHeader companyName="Beckhoff" productName="TwinCAT" productVersion="3.1" creationDateTime="2024-01-01T00:00:00"/>
  <types>
    <pous>
      <pou name="MAIN" pouType="program">
        <interface>
          <inputVars>
            <variable name="bStart" address="%IX0.0">
              <type><BOOL/></type>
              <documentation><xhtml xmlns="http://www.w3.org/1999/xhtml">Start button</xhtml></documentation>
            </variable>
          </inputVars>
          <localVars>
            <variable name="tDelay"><type><derived name="TON"/></type></variable>
            <variable name="sName"><type><string length="80"/></type>
              <initialValue><simpleValue value="'line 1'"/></initialValue>
            </variable>
            <variable name="lrValue"><type><LREAL/></type></variable>
          </localVars>
        </interface>
      </pou>
    </pous>
  </types>
  <instances>
    <configurations>
      <configuration name="Cfg">
        <globalVars>
          <variable name="nSpeed" address="%MW10"><type><INT/></type></variable>
        </globalVars>
      </configuration>
    </configurations>
  </instances>
</project>"#;

        let decoded = decode(beckhoff(), doc).unwrap();
        let names: Vec<_> = decoded.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["bStart", "tDelay", "sName", "nSpeed"]);

        assert_eq!(decoded.tags[0].scope, Scope::Input);
        assert_eq!(decoded.tags[0].category, Category::Input);
        assert_eq!(decoded.tags[0].description, "Start button");
        assert_eq!(decoded.tags[1].data_type, DataType::Timer);
        assert_eq!(decoded.tags[2].data_type, DataType::String);
        assert_eq!(decoded.tags[2].default_value, "'line 1'");
        assert_eq!(decoded.tags[3].scope, Scope::Global);
        assert_eq!(decoded.tags[3].category, Category::Memory);

        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.issues[0].code, DiagnosticCode::UntranslatableType);
        assert_eq!(decoded.issues[0].tag.as_deref(), Some("lrValue"));
    }

    #[test]
    fn test_decode_variable_without_type() {
        let doc = br#"<project><types><pous><pou name="P"><interface><localVars>
            <variable name="x"/>
        </localVars></interface></pou></pous></types></project>"#;
        let err = decode(beckhoff(), doc).unwrap_err();
        assert_eq!(
            err.location(),
            Some(&Location::Element(
                "project/types[1]/pous[1]/pou[1]/interface[1]/localVars[1]/variable[1]".to_string()
            ))
        );
    }
}
