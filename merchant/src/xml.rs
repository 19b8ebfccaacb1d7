//! XML form of parameter sets, as exchanged with the gateway's result
//! callback (`sp_xml` notifications in, `<response>` acknowledgements out).

use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::io::{Cursor, Write};

use crate::{
    error::CodecError,
    params::{ParamSet, ParamValue},
};

/// Serializes `params` as a standalone document wrapped in `root`.
///
/// Every key becomes a child element in insertion order; nested sets become
/// nested elements.
pub fn to_document(params: &ParamSet, root: &str) -> Result<String, CodecError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    write_element(&mut writer, root, params)?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(xml_error)
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    params: &ParamSet,
) -> Result<(), CodecError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    for (key, value) in params.iter() {
        match value {
            ParamValue::Set(nested) => write_element(writer, key, nested)?,
            scalar => {
                let text = scalar.to_string();
                writer
                    .write_event(Event::Start(BytesStart::new(key)))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&text)))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new(key)))
                    .map_err(xml_error)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

struct Frame {
    name: String,
    text: String,
    children: ParamSet,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: ParamSet::new(),
        }
    }

    fn into_entry(self) -> (String, ParamValue) {
        let value = if self.children.is_empty() {
            ParamValue::Str(self.text)
        } else {
            ParamValue::Set(self.children)
        };
        (self.name, value)
    }
}

/// Parses a document into the parameter set held by its root element.
///
/// Leaf elements map to string values (text kept verbatim), elements with
/// children map to nested sets.
pub fn parse_document(xml: &str) -> Result<ParamSet, CodecError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(Frame::new(element_name(&start))),
            Event::Empty(start) => {
                let name = element_name(&start);
                match stack.last_mut() {
                    Some(parent) => {
                        parent.children.insert(name, ParamValue::Str(String::new()));
                    }
                    None => root = Some(ParamSet::new()),
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| CodecError::Xml("unbalanced closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => {
                        let (name, value) = frame.into_entry();
                        parent.children.insert(name, value);
                    }
                    None => root = Some(frame.children),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(CodecError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| CodecError::Xml("document has no root element".to_string()))
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn xml_error(e: impl std::fmt::Display) -> CodecError {
    CodecError::Xml(e.to_string())
}
