//! Streaming markup parser with start/text/end callbacks.
//!
//! Element names are passed through as written (`pgterms:etext`), never
//! resolved against namespace URIs. Entities declared in the DOCTYPE internal
//! subset are expanded in text and attribute values.

use crate::error::{CatalogError, Result};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::io::{self, BufRead};
use std::path::PathBuf;
use tracing::debug;

static ENTITY_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!ENTITY\s+([A-Za-z_][\w.\-]*)\s+(?:"([^"]*)"|'([^']*)')\s*>"#).unwrap()
});

/// Receives markup events in document order.
///
/// `characters` may fire several times for one element; receivers concatenate.
pub trait MarkupHandler {
    fn start_element(&mut self, name: &str, attrs: &Attributes) -> Result<()>;
    fn end_element(&mut self, name: &str) -> Result<()>;
    fn characters(&mut self, text: &str) -> Result<()>;
}

/// Attribute values of one start tag, entity-expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pairs: Vec<(String, String)>,
}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

pub struct MarkupEventParser<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    entities: FxHashMap<String, String>,
    depth: usize,
    seen_root: bool,
    elements: u64,
}

impl<R: BufRead> MarkupEventParser<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.expand_empty_elements(true);
        reader.check_end_names(true);
        reader.trim_text(false);

        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            entities: FxHashMap::default(),
            depth: 0,
            seen_root: false,
            elements: 0,
        }
    }

    /// Drives `handler` until end of input. Unclosed elements at end of
    /// input, mismatched end tags and undeclared entities are fatal.
    pub fn parse<H: MarkupHandler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            let position = self.reader.buffer_position() as u64;
            match self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| read_error(e, position))?
            {
                Event::Start(ref e) => {
                    let name = decode_name(e.name().as_ref())
                        .map_err(|err| err.at(position))?
                        .to_string();
                    let attrs =
                        collect_attributes(e, &self.entities).map_err(|err| err.at(position))?;
                    self.depth += 1;
                    self.elements += 1;
                    self.seen_root = true;
                    handler
                        .start_element(&name, &attrs)
                        .map_err(|err| err.at(position))?;
                }
                Event::End(ref e) => {
                    let name = decode_name(e.name().as_ref())
                        .map_err(|err| err.at(position))?
                        .to_string();
                    if self.depth == 0 {
                        return Err(CatalogError::malformed(format!(
                            "unexpected end tag </{}>",
                            name
                        ))
                        .at(position));
                    }
                    self.depth -= 1;
                    handler.end_element(&name).map_err(|err| err.at(position))?;
                }
                Event::Text(ref e) => {
                    if self.depth > 0 {
                        let text = e
                            .unescape_with(|ent| resolve_entity(&self.entities, ent))
                            .map_err(|err| {
                                CatalogError::malformed(err.to_string()).at(position)
                            })?;
                        if !text.is_empty() {
                            handler
                                .characters(&text)
                                .map_err(|err| err.at(position))?;
                        }
                    }
                }
                Event::CData(e) => {
                    if self.depth > 0 {
                        let text = String::from_utf8(e.into_inner().into_owned()).map_err(|_| {
                            CatalogError::malformed("CDATA section is not valid UTF-8").at(position)
                        })?;
                        handler
                            .characters(&text)
                            .map_err(|err| err.at(position))?;
                    }
                }
                Event::DocType(ref e) => {
                    let declared = collect_entities(&String::from_utf8_lossy(e));
                    debug!(entities = declared.len(), "DOCTYPE entities declared");
                    self.entities.extend(declared);
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(CatalogError::malformed(format!(
                            "{} unclosed element(s) at end of stream",
                            self.depth
                        ))
                        .at(position));
                    }
                    if !self.seen_root {
                        return Err(CatalogError::malformed("no element found").at(position));
                    }
                    break;
                }
                _ => {}
            }
            self.buf.clear();
        }
        Ok(())
    }

    /// Start tags seen so far.
    pub fn elements(&self) -> u64 {
        self.elements
    }

    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }
}

fn read_error(e: quick_xml::Error, position: u64) -> CatalogError {
    match e {
        quick_xml::Error::Io(io_err) if io_err.kind() == io::ErrorKind::InvalidData => {
            CatalogError::Decompress {
                message: io_err.to_string(),
            }
        }
        // The pipeline fills in the path
        quick_xml::Error::Io(io_err) => CatalogError::SourceUnavailable {
            path: PathBuf::new(),
            source: io::Error::new(io_err.kind(), io_err.to_string()),
        },
        other => CatalogError::MalformedMarkup {
            position,
            message: other.to_string(),
        },
    }
}

fn decode_name(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).map_err(|_| CatalogError::malformed("element name is not valid UTF-8"))
}

fn resolve_entity<'a>(entities: &'a FxHashMap<String, String>, name: &str) -> Option<&'a str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => entities.get(name).map(String::as_str),
    }
}

fn collect_attributes(
    start: &BytesStart<'_>,
    entities: &FxHashMap<String, String>,
) -> Result<Attributes> {
    let mut pairs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| CatalogError::malformed(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|_| CatalogError::malformed("attribute name is not valid UTF-8"))?
            .to_string();
        let value = attr
            .unescape_value_with(|ent| resolve_entity(entities, ent))
            .map_err(|e| CatalogError::malformed(e.to_string()))?
            .into_owned();
        pairs.push((key, value));
    }
    Ok(Attributes { pairs })
}

/// Pulls `<!ENTITY name "value">` declarations out of a DOCTYPE body.
fn collect_entities(doctype: &str) -> Vec<(String, String)> {
    ENTITY_DECL
        .captures_iter(doctype)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (caps[1].to_string(), value.to_string())
        })
        .collect()
}
