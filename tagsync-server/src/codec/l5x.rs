//! Rockwell L5X tag export
//!
//! Controller-scoped tags are written under `Controller/Tags`. A tag with
//! an address becomes an `Alias` for it; unaddressed tags are `Base`.
//! Program-scoped tags (`Programs/Program/Tags`) are read on import.

use chrono::Utc;
use tagsync_common::CanonicalTag;

use super::xml::{self, Element, XmlWriter};
use super::{CodecError, Decoded, Location, RowFields};
use crate::vendor::VendorDialect;

const ROOT: &str = "RSLogix5000Content";

pub fn encode(dialect: &dyn VendorDialect, tags: &[CanonicalTag]) -> Result<Vec<u8>, CodecError> {
    let export_date = Utc::now().format("%a %b %d %H:%M:%S %Y").to_string();
    let mut w = XmlWriter::new();

    w.declaration(Some("yes"))?;
    w.start(
        ROOT,
        &[
            ("SchemaRevision", "1.0"),
            ("SoftwareRevision", "32.00"),
            ("TargetName", "Tags"),
            ("TargetType", "Controller"),
            ("ContainsContext", "true"),
            ("ExportDate", export_date.as_str()),
            ("ExportOptions", "References NoRawData L5KData DecoratedData"),
        ],
    )?;
    w.start("Controller", &[("Use", "Context"), ("Name", "Tags")])?;
    w.start("Tags", &[("Use", "Context")])?;

    for tag in tags {
        let data_type = dialect.type_name(tag.data_type);
        let usage = dialect.scope_keyword(tag.scope);
        let address = dialect.container_address(&tag.address);

        let mut attributes = vec![("Name", tag.name.as_str())];
        if address.is_empty() {
            attributes.push(("TagType", "Base"));
        } else {
            attributes.push(("TagType", "Alias"));
            attributes.push(("AliasFor", address.as_str()));
        }
        attributes.push(("DataType", data_type));
        attributes.push(("Usage", usage));
        attributes.push(("ExternalAccess", "Read/Write"));

        w.start("Tag", &attributes)?;
        if !tag.description.is_empty() {
            w.cdata_element("Description", &tag.description)?;
        }
        if !tag.default_value.is_empty() {
            w.start("Data", &[("Format", "Decorated")])?;
            w.empty(
                "DataValue",
                &[("DataType", data_type), ("Value", tag.default_value.as_str())],
            )?;
            w.end("Data")?;
        }
        w.end("Tag")?;
    }

    w.end("Tags")?;
    w.end("Controller")?;
    w.end(ROOT)?;
    Ok(w.finish())
}

pub fn decode(dialect: &dyn VendorDialect, bytes: &[u8]) -> Result<Decoded, CodecError> {
    let root = xml::parse(bytes)?;
    if root.name != ROOT {
        return Err(CodecError::malformed(
            Location::Element(root.name.clone()),
            format!("expected <{}> root", ROOT),
        ));
    }
    let controller = root.child("Controller").ok_or_else(|| {
        CodecError::malformed(Location::Element(ROOT.to_string()), "missing <Controller>")
    })?;

    let mut decoded = Decoded::default();
    let controller_path = format!("{}/Controller", ROOT);

    if let Some(tags) = controller.child("Tags") {
        read_tags(dialect, tags, "Global", &format!("{}/Tags", controller_path), &mut decoded)?;
    }

    if let Some(programs) = controller.child("Programs") {
        for program in programs.children_named("Program") {
            let name = program.attr("Name").unwrap_or_default();
            if let Some(tags) = program.child("Tags") {
                let path = format!("{}/Programs/Program[@Name='{}']/Tags", controller_path, name);
                read_tags(dialect, tags, "Local", &path, &mut decoded)?;
            }
        }
    }

    Ok(decoded)
}

fn read_tags(
    dialect: &dyn VendorDialect,
    tags: &Element,
    default_usage: &str,
    path: &str,
    decoded: &mut Decoded,
) -> Result<(), CodecError> {
    for (index, tag) in tags.children_named("Tag").enumerate() {
        let name = tag.attr("Name").ok_or_else(|| {
            CodecError::malformed(
                Location::Element(format!("{}/Tag[{}]", path, index + 1)),
                "tag without Name",
            )
        })?;

        let default_value = tag
            .children_named("Data")
            .find(|d| d.attr("Format") == Some("Decorated"))
            .and_then(|d| d.child("DataValue"))
            .and_then(|v| v.attr("Value"))
            .unwrap_or_default();

        let address = match tag.attr("TagType") {
            Some(kind) if kind.eq_ignore_ascii_case("Alias") => tag.attr("AliasFor").unwrap_or_default(),
            _ => "",
        };

        decoded.push_fields(
            dialect,
            RowFields {
                name: name.to_string(),
                type_name: tag.attr("DataType").unwrap_or_default().to_string(),
                address: address.to_string(),
                scope: tag.attr("Usage").unwrap_or(default_usage).to_string(),
                default_value: default_value.to_string(),
                description: tag.child_text("Description").unwrap_or_default().to_string(),
            },
            None,
        );
    }
    Ok(())
}
