//! Minimal XML tree used by the XML based codecs, with typed value accessors and a writer helper.
//!
//! The feeds handled by the crate are small documents that are easier to interpret as a tree than as an event
//! stream: KML styles are referenced before they are defined, GPX bounds follow the data and so on. The tree keeps
//! only element local names with their resolved namespaces, attributes and text.

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::GeoKitError;

mod values;
mod writer;

pub use values::{parse_bool, parse_datetime, strip_html};
pub use writer::XmlWriter;

/// Namespace of GML.
pub const GML_NAMESPACE: &str = "http://www.opengis.net/gml";
/// Namespace of GeoRSS simple elements.
pub const GEORSS_NAMESPACE: &str = "http://www.georss.org/georss";
/// Namespace of W3C basic geo vocabulary.
pub const GEO_NAMESPACE: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#";
/// Namespace of Atom feeds.
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
/// Namespace of KML 2.2.
pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
/// Namespace of GPX 1.1.
pub const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
/// Namespace of Garmin GPX extensions.
pub const GPXX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/GpxExtensions/v3";

/// Content of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// Child element.
    Element(XmlElement),
    /// Text or CDATA content.
    Text(String),
}

/// XML element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Local name of the element.
    pub name: String,
    /// Namespace of the element if it is bound to one.
    pub namespace: Option<String>,
    /// Attributes as (local name, value) pairs.
    pub attributes: Vec<(String, String)>,
    /// Content of the element.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an element without namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns true if the element has the given local name (case-sensitive).
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Returns true if the element has the given local name and namespace.
    pub fn is_ns(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Value of the attribute with the given local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(name))
    }

    /// First child element with the given local name and namespace.
    pub fn child_ns(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is_ns(namespace, name))
    }

    /// All child elements with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.is(name))
    }

    /// First element with the given local name in the subtree of this element (excluding the element itself),
    /// in document order.
    pub fn descendant(&self, name: &str) -> Option<&XmlElement> {
        for element in self.elements() {
            if element.is(name) {
                return Some(element);
            }
            if let Some(found) = element.descendant(name) {
                return Some(found);
            }
        }

        None
    }

    /// Concatenated text content of the element and all its descendants.
    pub fn text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, target: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => target.push_str(text),
                XmlNode::Element(element) => element.collect_text(target),
            }
        }
    }
}

/// Parses an XML document into a tree, returning the root element.
pub fn parse_document(data: &[u8]) -> Result<XmlElement, GeoKitError> {
    let mut reader = NsReader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = vec![];
    let mut root = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = match resolved {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            _ => None,
        };

        match event {
            Event::Start(start) => {
                let element = start_element(&start, namespace)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = start_element(&start, namespace)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    // Unknown entities (e.g. HTML `&nbsp;` in descriptions) are kept as is.
                    let value = match text.unescape() {
                        Ok(value) => value.into_owned(),
                        Err(_) => String::from_utf8_lossy(&text).into_owned(),
                    };
                    parent.children.push(XmlNode::Text(value));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(XmlNode::Text(String::from_utf8_lossy(&data.into_inner()).into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }

        if root.is_some() {
            break;
        }
    }

    root.ok_or_else(|| GeoKitError::parse("document has no root element"))
}

fn start_element(
    start: &quick_xml::events::BytesStart,
    namespace: Option<String>,
) -> Result<XmlElement, GeoKitError> {
    let mut attributes = vec![];
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        namespace,
        attributes,
        children: vec![],
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}
