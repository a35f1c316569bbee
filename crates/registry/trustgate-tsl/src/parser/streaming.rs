use super::builder::TrustListBuilder;
use super::{decode_utf8, TrustListParser};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use trustgate_types::{ParseError, TrustedListDocument};

/// Single-pass pull parser; memory use is bounded by element depth.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamingParser;

impl StreamingParser {
    pub fn new() -> Self {
        Self
    }
}

impl TrustListParser for StreamingParser {
    fn parse(&self, bytes: &[u8]) -> Result<TrustedListDocument, ParseError> {
        let text = decode_utf8(bytes)?;
        let mut reader = NsReader::from_str(text);
        reader.config_mut().check_end_names = true;

        let mut builder = TrustListBuilder::new();
        loop {
            let (unknown_prefix, event) = reader
                .read_resolved_event()
                .map(|(resolved, event)| match resolved {
                    ResolveResult::Unknown(prefix) => (Some(prefix), event),
                    _ => (None, event),
                })
                .map_err(|e| {
                    ParseError::Xml(format!("{} at byte {}", e, reader.error_position()))
                })?;

            match event {
                Event::DocType(_) => return Err(ParseError::DtdForbidden),
                Event::Start(start) => {
                    check_bindings(&reader, unknown_prefix, &start)?;
                    builder.start_element(local_name(start.local_name().as_ref())?)?;
                }
                Event::Empty(start) => {
                    check_bindings(&reader, unknown_prefix, &start)?;
                    builder.start_element(local_name(start.local_name().as_ref())?)?;
                    builder.end_element();
                }
                Event::End(_) => builder.end_element(),
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    builder.text(&text)?;
                }
                Event::CData(data) => {
                    let data = std::str::from_utf8(&data)
                        .map_err(|e| ParseError::Encoding(e.to_string()))?;
                    builder.text(data)?;
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) => {}
            }
        }
        builder.finish()
    }

    fn name(&self) -> &'static str {
        "streaming"
    }
}

/// Every prefix on the element and its attributes must be declared in scope.
fn check_bindings(
    reader: &NsReader<&[u8]>,
    element_prefix: Option<Vec<u8>>,
    start: &BytesStart<'_>,
) -> Result<(), ParseError> {
    if let Some(prefix) = element_prefix {
        return Err(unknown_prefix(&prefix));
    }
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
        if let (ResolveResult::Unknown(prefix), _) = reader.resolve_attribute(attr.key) {
            return Err(unknown_prefix(&prefix));
        }
    }
    Ok(())
}

fn unknown_prefix(prefix: &[u8]) -> ParseError {
    ParseError::Xml(format!(
        "unknown namespace prefix '{}'",
        String::from_utf8_lossy(prefix)
    ))
}

fn local_name(raw: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(raw).map_err(|e| ParseError::Encoding(e.to_string()))
}
