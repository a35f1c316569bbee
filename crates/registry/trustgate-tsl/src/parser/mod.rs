//! Trusted-list parser strategies.
//!
//! [`StreamingParser`] is a quick-xml pull parser; [`DomParser`] builds a
//! roxmltree document first. Both refuse document type declarations and feed
//! the same builder, so for any input they return equal documents or both fail.

mod builder;
pub(crate) mod dom;
mod streaming;

pub use dom::DomParser;
pub use streaming::StreamingParser;

use std::sync::Arc;
use trustgate_types::{ParseError, ParserKind, TrustedListDocument};

/// Turns raw trusted-list bytes into a [`TrustedListDocument`].
pub trait TrustListParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<TrustedListDocument, ParseError>;

    fn name(&self) -> &'static str;
}

/// Parser strategy for the configured [`ParserKind`].
pub fn parser_for(kind: ParserKind) -> Arc<dyn TrustListParser> {
    match kind {
        ParserKind::Streaming => Arc::new(StreamingParser::new()),
        ParserKind::Dom => Arc::new(DomParser::new()),
    }
}

/// Decodes the document as UTF-8, dropping a leading byte-order mark.
pub(crate) fn decode_utf8(bytes: &[u8]) -> Result<&str, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Encoding(e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}
