// crates/mbccb-rs-xml/src/parser.rs

use crate::error::{CompileError, XmlError};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use log::{debug, trace};
use mbccb_rs::{Compilation, Element};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Parses an XML document into an [`Element`] tree.
///
/// Only elements and their attributes are kept. Text, comments, CDATA,
/// processing instructions and the XML declaration are skipped, so a
/// `<description>` keeps its tag but loses its prose.
///
/// # Errors
/// Returns an `XmlError` for malformed markup, duplicated or malformed
/// attributes, a missing root element, a second top-level element, or
/// input that ends inside an open element.
pub fn parse_document(xml: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut count = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(element_from(&e)?);
            }
            Event::Empty(e) => {
                let el = element_from(&e)?;
                count += 1;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                // quick-xml rejects unmatched end tags itself.
                if let Some(el) = stack.pop() {
                    count += 1;
                    attach(&mut stack, &mut root, el)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::UnexpectedEof { open: open.tag });
    }
    let root = root.ok_or(XmlError::MissingRoot)?;
    debug!("Parsed <{}> with {} element(s)", root.tag, count);
    Ok(root)
}

/// Parses and compiles a document in one step.
///
/// # Errors
/// `CompileError::Xml` for markup errors, `CompileError::Compile` when the
/// compiler rejects the document.
pub fn compile_str(xml: &str) -> Result<Compilation, CompileError> {
    let root = parse_document(xml)?;
    Ok(mbccb_rs::compile(&root)?)
}

/// Closes `el`: appends it to its parent, or makes it the root.
fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_some() => return Err(XmlError::MultipleRoots { tag: el.tag }),
        None => *root = Some(el),
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let tag = name_str(start.name().as_ref())?;
    let mut el = Element::new(tag);
    for attr in start.attributes() {
        let attr = attr?;
        let key = name_str(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(quick_xml::Error::from)?
            .into_owned();
        trace!("<{}> {}=\"{}\"", el.tag, key, value);
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn name_str(raw: &[u8]) -> Result<String, XmlError> {
    Ok(core::str::from_utf8(raw)?.to_string())
}
