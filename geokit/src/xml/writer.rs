use std::io::Write;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::GeoKitError;

/// Thin wrapper around [`quick_xml::Writer`] producing indented documents.
pub struct XmlWriter<W: Write> {
    inner: Writer<W>,
}

impl<W: Write> XmlWriter<W> {
    /// Creates a writer indenting nested elements with two spaces.
    pub fn new(out: W) -> Self {
        Self {
            inner: Writer::new_with_indent(out, b' ', 2),
        }
    }

    /// Writes `<?xml version="1.0" encoding="UTF-8"?>` declaration.
    pub fn declaration(&mut self) -> Result<(), GeoKitError> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    /// Opens an element.
    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), GeoKitError> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.inner.write_event(Event::Start(start))?;
        Ok(())
    }

    /// Closes an element.
    pub fn end(&mut self, name: &str) -> Result<(), GeoKitError> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Writes an element without content.
    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), GeoKitError> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.inner.write_event(Event::Empty(start))?;
        Ok(())
    }

    /// Writes an element containing only (escaped) text.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<(), GeoKitError> {
        self.text_element_with(name, &[], text)
    }

    /// Writes an element with attributes containing only (escaped) text.
    pub fn text_element_with(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> Result<(), GeoKitError> {
        self.start(name, attributes)?;
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Writes an element with the text wrapped into a CDATA section. Used for HTML descriptions.
    pub fn cdata_element(&mut self, name: &str, text: &str) -> Result<(), GeoKitError> {
        self.start(name, &[])?;
        // `]]>` cannot appear inside a section, so it is split between two.
        let mut rest = text;
        while let Some(index) = rest.find("]]>") {
            self.inner
                .write_event(Event::CData(BytesCData::new(&rest[..index + 2])))?;
            rest = &rest[index + 2..];
        }
        self.inner.write_event(Event::CData(BytesCData::new(rest)))?;
        self.end(name)
    }

    /// Writes an optional text element, doing nothing if the value is `None`.
    pub fn optional_element(&mut self, name: &str, text: Option<&str>) -> Result<(), GeoKitError> {
        match text {
            Some(text) if !text.is_empty() => self.text_element(name, text),
            _ => Ok(()),
        }
    }

    /// Returns the underlying output.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}
