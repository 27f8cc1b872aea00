//! Siemens TIA Portal tag table (Openness XML)
//!
//! `Document/SW.Tags.PlcTagTable/ObjectList/SW.Tags.PlcTag`, attributes in
//! each tag's `AttributeList`. The comment is an `en-US` item of the tag's
//! `MultilingualText`. `DefaultValue` and `Usage` are extra attributes that
//! TIA itself ignores on import.

use tagsync_common::CanonicalTag;

use super::xml::{self, Element, XmlWriter};
use super::{CodecError, Decoded, Location, RowFields};
use crate::vendor::VendorDialect;

const TABLE: &str = "SW.Tags.PlcTagTable";
const TAG: &str = "SW.Tags.PlcTag";
const CULTURE: &str = "en-US";

/// Sequential hexadecimal object IDs, as the Openness exporter writes them
struct IdSequence(u32);

impl IdSequence {
    fn next(&mut self) -> String {
        let id = format!("{:X}", self.0);
        self.0 += 1;
        id
    }
}

pub fn encode(dialect: &dyn VendorDialect, tags: &[CanonicalTag]) -> Result<Vec<u8>, CodecError> {
    let mut ids = IdSequence(0);
    let mut w = XmlWriter::new();

    w.declaration(None)?;
    w.start("Document", &[])?;
    w.empty("Engineering", &[("version", "V17")])?;
    let table_id = ids.next();
    w.start(TABLE, &[("ID", table_id.as_str())])?;
    w.start("AttributeList", &[])?;
    w.text_element("Name", "Default tag table")?;
    w.end("AttributeList")?;
    w.start("ObjectList", &[])?;

    for tag in tags {
        let tag_id = ids.next();
        w.start(TAG, &[("ID", tag_id.as_str()), ("CompositionName", "Tags")])?;

        w.start("AttributeList", &[])?;
        w.text_element("DataTypeName", dialect.type_name(tag.data_type))?;
        if !tag.default_value.is_empty() {
            w.text_element("DefaultValue", &tag.default_value)?;
        }
        w.text_element("LogicalAddress", &dialect.container_address(&tag.address))?;
        w.text_element("Name", &tag.name)?;
        w.text_element("Usage", dialect.scope_keyword(tag.scope))?;
        w.end("AttributeList")?;

        if !tag.description.is_empty() {
            let text_id = ids.next();
            let item_id = ids.next();
            w.start("ObjectList", &[])?;
            w.start(
                "MultilingualText",
                &[("ID", text_id.as_str()), ("CompositionName", "Comment")],
            )?;
            w.start("ObjectList", &[])?;
            w.start(
                "MultilingualTextItem",
                &[("ID", item_id.as_str()), ("CompositionName", "Items")],
            )?;
            w.start("AttributeList", &[])?;
            w.text_element("Culture", CULTURE)?;
            w.text_element("Text", &tag.description)?;
            w.end("AttributeList")?;
            w.end("MultilingualTextItem")?;
            w.end("ObjectList")?;
            w.end("MultilingualText")?;
            w.end("ObjectList")?;
        }

        w.end(TAG)?;
    }

    w.end("ObjectList")?;
    w.end(TABLE)?;
    w.end("Document")?;
    Ok(w.finish())
}

pub fn decode(dialect: &dyn VendorDialect, bytes: &[u8]) -> Result<Decoded, CodecError> {
    let root = xml::parse(bytes)?;
    if root.name != "Document" {
        return Err(CodecError::malformed(
            Location::Element(root.name.clone()),
            "expected <Document> root",
        ));
    }
    if root.descendants(TABLE, "Document").is_empty() {
        return Err(CodecError::malformed(
            Location::Element("Document".to_string()),
            format!("missing <{}>", TABLE),
        ));
    }

    let mut decoded = Decoded::default();
    for (path, tag) in root.descendants(TAG, "Document") {
        let attributes = tag.child("AttributeList").ok_or_else(|| {
            CodecError::malformed(Location::Element(path.clone()), "tag without AttributeList")
        })?;
        let name = attributes
            .child_text("Name")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CodecError::malformed(Location::Element(path.clone()), "tag without Name"))?;

        decoded.push_fields(
            dialect,
            RowFields {
                name: name.to_string(),
                type_name: attributes.child_text("DataTypeName").unwrap_or_default().to_string(),
                address: attributes.child_text("LogicalAddress").unwrap_or_default().to_string(),
                scope: attributes.child_text("Usage").unwrap_or_default().to_string(),
                default_value: attributes.child_text("DefaultValue").unwrap_or_default().to_string(),
                description: comment(tag).unwrap_or_default().to_string(),
            },
            None,
        );
    }

    Ok(decoded)
}

/// English comment, or the first culture present
fn comment(tag: &Element) -> Option<&str> {
    let text = tag
        .child("ObjectList")?
        .children_named("MultilingualText")
        .find(|m| m.attr("CompositionName") == Some("Comment"))?;

    let items: Vec<&Element> = text
        .child("ObjectList")?
        .children_named("MultilingualTextItem")
        .filter_map(|item| item.child("AttributeList"))
        .collect();

    let item = items
        .iter()
        .copied()
        .find(|a| a.child_text("Culture") == Some(CULTURE))
        .or_else(|| items.first().copied())?;
    item.child_text("Text")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::dialect;
    use tagsync_common::{Category, DataType, Scope, Vendor};

    fn siemens() -> &'static dyn VendorDialect {
        dialect(Vendor::Siemens)
    }

    #[test]
    fn test_encode_tag_table() {
        let mut lamp = CanonicalTag::new("Lamp", DataType::Bool, Vendor::Siemens);
        lamp.address = "Q0.1".to_string();
        lamp.scope = Scope::Output;
        lamp.category = Category::Output;
        lamp.description = "Panel lamp".to_string();

        let text = String::from_utf8(encode(siemens(), &[lamp]).unwrap()).unwrap();
        assert!(text.contains("<LogicalAddress>%Q0.1</LogicalAddress>"));
        assert!(text.contains("<DataTypeName>Bool</DataTypeName>"));
        assert!(text.contains(r#"<SW.Tags.PlcTag ID="1" CompositionName="Tags">"#));
        assert!(text.contains("<Text>Panel lamp</Text>"));
    }

    #[test]
    fn test_decode_openness_export() {
        let doc = br#"<?xml version="1.0" encoding="utf-8"?>
<Document>
  <Engineering version="V17" />
  <SW.Tags.PlcTagTable ID="0">
    <AttributeList><Name>Motors</Name></AttributeList>
    <ObjectList>
      <SW.Tags.PlcTag ID="1" CompositionName="Tags">
        <AttributeList>
          <DataTypeName>Int</DataTypeName>
          <ExternalAccessible>true</ExternalAccessible>
          <LogicalAddress>%IW4</LogicalAddress>
          <Name>Speed_Raw</Name>
        </AttributeList>
        <ObjectList>
          <MultilingualText ID="2" CompositionName="Comment">
            <ObjectList>
              <MultilingualTextItem ID="3" CompositionName="Items">
                <AttributeList><Culture>de-DE</Culture><Text>Drehzahl</Text></AttributeList>
              </MultilingualTextItem>
              <MultilingualTextItem ID="4" CompositionName="Items">
                <AttributeList><Culture>en-US</Culture><Text>Raw speed</Text></AttributeList>
              </MultilingualTextItem>
            </ObjectList>
          </MultilingualText>
        </ObjectList>
      </SW.Tags.PlcTag>
      <SW.Tags.PlcTag ID="5" CompositionName="Tags">
        <AttributeList>
          <DataTypeName>Bool</DataTypeName>
          <LogicalAddress>%M10.0</LogicalAddress>
          <Name>Run_Flag</Name>
        </AttributeList>
      </SW.Tags.PlcTag>
    </ObjectList>
  </SW.Tags.PlcTagTable>
</Document>"#;

        let decoded = decode(siemens(), doc).unwrap();
        assert!(decoded.issues.is_empty());
        assert_eq!(decoded.tags.len(), 2);

        let speed = &decoded.tags[0];
        assert_eq!(speed.name, "Speed_Raw");
        assert_eq!(speed.data_type, DataType::Int16);
        assert_eq!(speed.address, "IW4");
        assert_eq!(speed.category, Category::Input);
        assert_eq!(speed.scope, Scope::Local);
        assert_eq!(speed.description, "Raw speed");

        assert_eq!(decoded.tags[1].category, Category::Memory);
    }

    #[test]
    fn test_decode_tag_without_name() {
        let doc = br#"<Document><SW.Tags.PlcTagTable ID="0"><ObjectList>
            <SW.Tags.PlcTag ID="1"><AttributeList><DataTypeName>Bool</DataTypeName></AttributeList></SW.Tags.PlcTag>
        </ObjectList></SW.Tags.PlcTagTable></Document>"#;
        let err = decode(siemens(), doc).unwrap_err();
        assert_eq!(
            err.location(),
            Some(&Location::Element(
                "Document/SW.Tags.PlcTagTable[1]/ObjectList[1]/SW.Tags.PlcTag[1]".to_string()
            ))
        );
    }

    #[test]
    fn test_decode_requires_tag_table() {
        assert!(decode(siemens(), b"<Document><Engineering/></Document>").is_err());
        assert!(decode(siemens(), b"<Tags/>").is_err());
    }
}
