//! Minimal XML tree over quick-xml
//!
//! The vendor documents are small; reading them into a tree keeps each
//! format's decoder a plain walk instead of an event state machine.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{CodecError, Location};

#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    /// Local name (namespace prefix dropped)
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of a direct child
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    /// All descendants with the given name, with their element paths
    pub fn descendants<'a>(&'a self, name: &str, path: &str) -> Vec<(String, &'a Element)> {
        let mut found = Vec::new();
        self.collect(name, path, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, path: &str, found: &mut Vec<(String, &'a Element)>) {
        for (index, child) in self.children.iter().enumerate() {
            let child_path = format!("{}/{}[{}]", path, child.name, index + 1);
            if child.name == name {
                found.push((child_path.clone(), child));
            }
            child.collect(name, &child_path, found);
        }
    }
}

// ========================================
// Reading
// ========================================

pub(crate) fn parse(bytes: &[u8]) -> Result<Element, CodecError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CodecError::malformed(Location::Document, format!("not UTF-8: {}", e)))?;
    let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let offset = reader.buffer_position();
        let syntax = |e: quick_xml::Error| CodecError::malformed(Location::Offset(offset), e.to_string());

        match reader.read_event().map_err(syntax)? {
            Event::Start(start) => stack.push(open(&start, offset)?),
            Event::Empty(start) => {
                let element = open(&start, offset)?;
                attach(&mut stack, &mut root, element, offset)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    CodecError::malformed(Location::Offset(offset), "unexpected closing tag")
                })?;
                attach(&mut stack, &mut root, element, offset)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().map_err(syntax)?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(CodecError::malformed(
            Location::Document,
            format!("document ends inside <{}>", open.name),
        ));
    }
    root.ok_or_else(|| CodecError::malformed(Location::Document, "no root element"))
}

fn open(start: &BytesStart<'_>, offset: usize) -> Result<Element, CodecError> {
    let mut element = Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..Element::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|e| CodecError::malformed(Location::Offset(offset), e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| CodecError::malformed(Location::Offset(offset), e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    offset: usize,
) -> Result<(), CodecError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(CodecError::malformed(
            Location::Offset(offset),
            "more than one root element",
        ));
    }
    *root = Some(element);
    Ok(())
}

// ========================================
// Writing
// ========================================

/// Indented document writer with codec errors
pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), CodecError> {
        self.inner
            .write_event(event)
            .map_err(|e| CodecError::Write(e.to_string()))
    }

    pub fn declaration(&mut self, standalone: Option<&str>) -> Result<(), CodecError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), standalone)))
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), CodecError> {
        self.write(Event::Start(
            BytesStart::new(name).with_attributes(attributes.iter().copied()),
        ))
    }

    pub fn end(&mut self, name: &str) -> Result<(), CodecError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), CodecError> {
        self.write(Event::Empty(
            BytesStart::new(name).with_attributes(attributes.iter().copied()),
        ))
    }

    /// `<name>text</name>`
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<(), CodecError> {
        self.start(name, &[])?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// CDATA section, or escaped text when the content would end the
    /// section early
    pub fn cdata(&mut self, text: &str) -> Result<(), CodecError> {
        if text.contains("]]>") {
            self.write(Event::Text(BytesText::new(text)))
        } else {
            self.write(Event::CData(BytesCData::new(text)))
        }
    }

    /// `<name><![CDATA[text]]></name>`
    pub fn cdata_element(&mut self, name: &str, text: &str) -> Result<(), CodecError> {
        self.start(name, &[])?;
        self.cdata(text)?;
        self.end(name)
    }

    pub fn finish(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}
