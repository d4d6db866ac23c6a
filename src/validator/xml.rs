//! Minimal XML document-tree parse.
//!
//! Walks the whole document with `quick-xml` to prove it is well-formed
//! (one root, balanced tags) and records what the root looks like. That is
//! all the pipeline needs before handing the file to a schema checker.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use std::path::Path;

/// Namespace of W3C XML Schema documents.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Summary of a parsed, well-formed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    /// Local name of the root element.
    pub root: String,
    /// Namespace URI bound to the root element's prefix, if declared on it.
    pub namespace: Option<String>,
    /// Total number of elements.
    pub elements: usize,
}

impl XmlTree {
    /// True if the root is `schema` in the XSD namespace.
    pub fn is_xsd(&self) -> bool {
        self.root == "schema" && self.namespace.as_deref() == Some(XSD_NAMESPACE)
    }
}

/// Parse the file at `path`.
pub fn parse_file(path: &Path) -> Result<XmlTree, String> {
    let reader = Reader::from_file(path).map_err(|e| e.to_string())?;
    parse_reader(reader)
}

/// Parse an in-memory document.
pub fn parse_str(xml: &str) -> Result<XmlTree, String> {
    parse_reader(Reader::from_reader(xml.as_bytes()))
}

fn parse_reader<R: BufRead>(mut reader: Reader<R>) -> Result<XmlTree, String> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut elements = 0usize;
    let mut root: Option<(String, Option<String>)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(format!("at byte {}: {}", reader.buffer_position(), e)),
            Ok(Event::Start(e)) => {
                note_root(&e, depth, &mut root)?;
                elements += 1;
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                note_root(&e, depth, &mut root)?;
                elements += 1;
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(format!("{} element(s) left unclosed", depth));
    }
    let (root, namespace) = root.ok_or_else(|| "no root element".to_string())?;
    Ok(XmlTree {
        root,
        namespace,
        elements,
    })
}

fn note_root(
    e: &BytesStart<'_>,
    depth: usize,
    root: &mut Option<(String, Option<String>)>,
) -> Result<(), String> {
    if depth == 0 {
        if root.is_some() {
            return Err("more than one root element".to_string());
        }
        *root = Some(describe_root(e)?);
    }
    Ok(())
}

fn describe_root(e: &BytesStart<'_>) -> Result<(String, Option<String>), String> {
    let name = e.name();
    let local = String::from_utf8_lossy(name.local_name().as_ref()).into_owned();
    let ns_attr = match name.prefix() {
        Some(p) => format!("xmlns:{}", String::from_utf8_lossy(p.as_ref())),
        None => "xmlns".to_string(),
    };
    let mut namespace = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == ns_attr.as_bytes() {
            namespace = Some(String::from_utf8_lossy(&attr.value).into_owned());
        }
    }
    Ok((local, namespace))
}
