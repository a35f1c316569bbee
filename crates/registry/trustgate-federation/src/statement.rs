//! Entity-statement token decoding.
//!
//! Tokens are compact JWS (`header.payload.signature`). Only the payload is
//! read; the signature is not checked at this layer.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use trustgate_types::{EntityStatement, StatementError};

/// base64url that accepts payloads with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn decode_statement(token: &str) -> Result<EntityStatement, StatementError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(StatementError::IncorrectTokenPartsCount {
            actual_parts: parts.len(),
        });
    }

    let payload = URL_SAFE_LENIENT.decode(parts[1])?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Decodes a response body holding a statement token.
pub fn decode_statement_bytes(body: &[u8]) -> Result<EntityStatement, StatementError> {
    let token = std::str::from_utf8(body).map_err(|_| StatementError::Encoding)?;
    decode_statement(token)
}
