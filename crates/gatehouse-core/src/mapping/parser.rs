//! Recursive descent parser for user mapping documents.
//!
//! Each element has its own parse function which consumes the element's
//! children and hands the finished value back to its parent. The first
//! error aborts the whole parse.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::model::{AuthEntry, ConnectionConfig, PasswordEncoding, UserMapping, DEFAULT_CONNECTION};
use crate::error::MappingError;

const USER_MAPPING: &str = "user-mapping";
const AUTHORIZE: &str = "authorize";
const CONNECTION: &str = "connection";
const PROTOCOL: &str = "protocol";
const PARAM: &str = "param";

/// Parse a user mapping document.
pub fn parse_user_mapping(document: &str) -> Result<UserMapping, MappingError> {
    MappingParser::new(document).parse()
}

/// Parse a user mapping document from raw bytes, which must be UTF-8.
pub fn parse_user_mapping_bytes(bytes: &[u8]) -> Result<UserMapping, MappingError> {
    let document = std::str::from_utf8(bytes).map_err(|e| {
        MappingError::structural(
            format!("user mapping is not valid UTF-8: {}", e),
            e.valid_up_to() as u64,
        )
    })?;
    parse_user_mapping(document)
}

/// An opened element with its attributes.
#[derive(Debug)]
struct Element {
    name: String,
    attributes: HashMap<String, String>,
    /// Self-closing (`<param name="x"/>`), so no children and no end tag.
    empty: bool,
}

/// A markup event relevant to the grammar.
#[derive(Debug)]
enum Node {
    Open(Element),
    Close(String),
    Text(String),
    Eof,
}

/// Parser for user mapping documents.
pub struct MappingParser<'source> {
    reader: Reader<&'source [u8]>,
}

impl<'source> MappingParser<'source> {
    /// Create a new parser for the given document.
    pub fn new(document: &'source str) -> Self {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(false);
        Self { reader }
    }

    /// Parse the complete document.
    pub fn parse(mut self) -> Result<UserMapping, MappingError> {
        loop {
            match self.next_node()? {
                Node::Text(text) if is_blank(&text) => continue,
                Node::Text(_) => return Err(self.structural("unexpected character data")),
                Node::Open(element) if element.name == USER_MAPPING => {
                    let mapping = self.parse_user_mapping(&element)?;
                    self.expect_end_of_document()?;
                    return Ok(mapping);
                }
                Node::Open(element) => {
                    return Err(self.structural(format!("unexpected tag: {}", element.name)))
                }
                Node::Close(name) => {
                    return Err(self.structural(format!("tag not yet complete: {}", name)))
                }
                Node::Eof => {
                    return Err(self.structural(format!("missing <{}> element", USER_MAPPING)))
                }
            }
        }
    }

    /// Parse `<user-mapping>` and its `authorize` children.
    fn parse_user_mapping(&mut self, element: &Element) -> Result<UserMapping, MappingError> {
        let mut mapping = UserMapping::new();

        if element.empty {
            return Ok(mapping);
        }

        while let Some(child) = self.next_child(USER_MAPPING)? {
            if child.name != AUTHORIZE {
                return Err(self.unexpected_tag(&child.name, USER_MAPPING));
            }

            let entry = self.parse_authorize(&child)?;
            if let Some(previous) = mapping.insert(entry) {
                // Last definition wins, matching long-standing behavior.
                tracing::warn!(
                    username = %previous.username(),
                    "duplicate authorize entry replaces an earlier definition"
                );
            }
        }

        Ok(mapping)
    }

    /// Parse `<authorize>` into a finished entry.
    fn parse_authorize(&mut self, element: &Element) -> Result<AuthEntry, MappingError> {
        let username = self.required_attribute(element, "username")?;
        let password = self.required_attribute(element, "password")?;

        let encoding = match element.attributes.get("encoding") {
            None => PasswordEncoding::Plain,
            Some(value) => PasswordEncoding::parse(value).ok_or_else(|| {
                MappingError::encoding(
                    format!("invalid encoding type: {}", value),
                    self.position(),
                )
            })?,
        };

        let mut entry = AuthEntry::new(username, password, encoding);

        if element.empty {
            return Ok(entry);
        }

        while let Some(child) = self.next_child(AUTHORIZE)? {
            match child.name.as_str() {
                CONNECTION => {
                    let (name, config) = self.parse_connection(&child)?;
                    entry.connections_mut().insert(name, config);
                }
                PROTOCOL => {
                    let protocol = self.parse_text(&child)?;
                    entry
                        .connections_mut()
                        .entry(DEFAULT_CONNECTION.to_string())
                        .or_default()
                        .set_protocol(protocol);
                }
                PARAM => {
                    let name = self.required_attribute(&child, "name")?;
                    let value = self.parse_text(&child)?;
                    entry
                        .connections_mut()
                        .entry(DEFAULT_CONNECTION.to_string())
                        .or_default()
                        .set_parameter(name, value);
                }
                other => return Err(self.unexpected_tag(other, AUTHORIZE)),
            }
        }

        Ok(entry)
    }

    /// Parse `<connection>` into its name and configuration.
    fn parse_connection(
        &mut self,
        element: &Element,
    ) -> Result<(String, ConnectionConfig), MappingError> {
        let name = self.required_attribute(element, "name")?;
        let mut config = ConnectionConfig::new();
        let mut has_protocol = false;

        if !element.empty {
            while let Some(child) = self.next_child(CONNECTION)? {
                match child.name.as_str() {
                    PROTOCOL => {
                        if has_protocol {
                            return Err(self.structural(format!(
                                "connection \"{}\" declares more than one protocol",
                                name
                            )));
                        }
                        config.set_protocol(self.parse_text(&child)?);
                        has_protocol = true;
                    }
                    PARAM => {
                        let param = self.required_attribute(&child, "name")?;
                        let value = self.parse_text(&child)?;
                        config.set_parameter(param, value);
                    }
                    other => return Err(self.unexpected_tag(other, CONNECTION)),
                }
            }
        }

        if !has_protocol {
            return Err(self.structural(format!("connection \"{}\" has no protocol", name)));
        }

        Ok((name, config))
    }

    /// Parse the text content of `<protocol>` or `<param>`.
    fn parse_text(&mut self, element: &Element) -> Result<String, MappingError> {
        let mut text = String::new();

        if element.empty {
            return Ok(text);
        }

        loop {
            match self.next_node()? {
                Node::Text(chunk) => text.push_str(&chunk),
                Node::Close(name) if name == element.name => return Ok(text),
                Node::Close(name) => {
                    return Err(self.structural(format!("tag not yet complete: {}", name)))
                }
                Node::Open(child) => return Err(self.unexpected_tag(&child.name, &element.name)),
                Node::Eof => return Err(self.unexpected_eof(&element.name)),
            }
        }
    }

    /// Next child element of `parent`, or `None` once `parent` closes.
    ///
    /// Whitespace between elements is skipped; any other text is rejected.
    fn next_child(&mut self, parent: &str) -> Result<Option<Element>, MappingError> {
        loop {
            match self.next_node()? {
                Node::Open(element) => return Ok(Some(element)),
                Node::Close(name) if name == parent => return Ok(None),
                Node::Close(name) => {
                    return Err(self.structural(format!("tag not yet complete: {}", name)))
                }
                Node::Text(text) if is_blank(&text) => continue,
                Node::Text(_) => return Err(self.structural("unexpected character data")),
                Node::Eof => return Err(self.unexpected_eof(parent)),
            }
        }
    }

    /// Only whitespace and comments may follow the root element.
    fn expect_end_of_document(&mut self) -> Result<(), MappingError> {
        loop {
            match self.next_node()? {
                Node::Eof => return Ok(()),
                Node::Text(text) if is_blank(&text) => continue,
                Node::Text(_) => return Err(self.structural("unexpected character data")),
                Node::Open(element) => {
                    return Err(self.structural(format!("unexpected tag: {}", element.name)))
                }
                Node::Close(name) => {
                    return Err(self.structural(format!("tag not yet complete: {}", name)))
                }
            }
        }
    }

    /// Read the next grammar-relevant event, skipping comments,
    /// declarations and processing instructions.
    fn next_node(&mut self) -> Result<Node, MappingError> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| self.structural(format!("malformed XML: {}", e)))?;

            match event {
                Event::Start(start) => return Ok(Node::Open(self.element(&start, false)?)),
                Event::Empty(start) => return Ok(Node::Open(self.element(&start, true)?)),
                Event::End(end) => return Ok(Node::Close(decode_name(end.local_name().as_ref()))),
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| self.structural(format!("malformed character data: {}", e)))?;
                    return Ok(Node::Text(text.into_owned()));
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| self.structural(format!("malformed CDATA section: {}", e)))?;
                    return Ok(Node::Text(text.to_string()));
                }
                Event::Eof => return Ok(Node::Eof),
                _ => continue,
            }
        }
    }

    fn element(&self, start: &BytesStart<'_>, empty: bool) -> Result<Element, MappingError> {
        let name = decode_name(start.local_name().as_ref());
        let mut attributes = HashMap::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| {
                self.structural(format!("malformed attribute on <{}>: {}", name, e))
            })?;
            let key = decode_name(attribute.key.local_name().as_ref());
            let value = attribute.unescape_value().map_err(|e| {
                self.structural(format!("malformed value for attribute \"{}\": {}", key, e))
            })?;
            attributes.insert(key, value.into_owned());
        }

        Ok(Element {
            name,
            attributes,
            empty,
        })
    }

    fn required_attribute(&self, element: &Element, name: &str) -> Result<String, MappingError> {
        element.attributes.get(name).cloned().ok_or_else(|| {
            self.structural(format!(
                "attribute \"{}\" required for {} tag",
                name, element.name
            ))
        })
    }

    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn structural(&self, message: impl Into<String>) -> MappingError {
        MappingError::structural(message, self.position())
    }

    fn unexpected_tag(&self, name: &str, parent: &str) -> MappingError {
        self.structural(format!("unexpected tag <{}> inside <{}>", name, parent))
    }

    fn unexpected_eof(&self, open: &str) -> MappingError {
        self.structural(format!("unexpected end of document inside <{}>", open))
    }
}

fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
