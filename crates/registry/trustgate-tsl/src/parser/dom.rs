use super::builder::TrustListBuilder;
use super::{decode_utf8, TrustListParser};
use crate::c14n::{traverse, Edge};
use roxmltree::{Document, ParsingOptions};
use trustgate_types::{ParseError, TrustedListDocument};

/// Builds the full tree with roxmltree, then walks it in document order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomParser;

impl DomParser {
    pub fn new() -> Self {
        Self
    }
}

/// roxmltree options with DTD processing refused.
pub(crate) fn hardened_options() -> ParsingOptions {
    ParsingOptions {
        allow_dtd: false,
        ..ParsingOptions::default()
    }
}

pub(crate) fn map_dom_error(err: roxmltree::Error) -> ParseError {
    match err {
        roxmltree::Error::DtdDetected => ParseError::DtdForbidden,
        roxmltree::Error::NoRootNode => ParseError::Empty,
        other => ParseError::Xml(other.to_string()),
    }
}

impl TrustListParser for DomParser {
    fn parse(&self, bytes: &[u8]) -> Result<TrustedListDocument, ParseError> {
        let text = decode_utf8(bytes)?;
        let doc = Document::parse_with_options(text, hardened_options()).map_err(map_dom_error)?;

        let mut builder = TrustListBuilder::new();
        for edge in traverse(doc.root()) {
            match edge {
                Edge::Open(node) if node.is_element() => {
                    builder.start_element(node.tag_name().name())?;
                }
                Edge::Open(node) if node.is_text() => {
                    if let Some(text) = node.text() {
                        builder.text(text)?;
                    }
                }
                Edge::Close(node) if node.is_element() => builder.end_element(),
                _ => {}
            }
        }
        builder.finish()
    }

    fn name(&self) -> &'static str {
        "dom"
    }
}
