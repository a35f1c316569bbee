//! X.509 helpers shared by the parser and the signature validator.

use base64::{engine::general_purpose::STANDARD, Engine};
use x509_parser::prelude::*;

/// Decodes a base64 certificate, tolerating embedded whitespace.
pub fn decode_base64_der(b64: &str) -> Option<Vec<u8>> {
    let compact: String = b64.split_whitespace().collect();
    STANDARD.decode(compact).ok()
}

/// RFC 4514 subject of a DER certificate.
pub fn subject_name(der: &[u8]) -> Option<String> {
    let (_, cert) = parse_x509_certificate(der).ok()?;
    Some(cert.subject().to_string())
}

pub fn subject_from_base64(b64: &str) -> Option<String> {
    decode_base64_der(b64).as_deref().and_then(subject_name)
}

/// DER `SubjectPublicKeyInfo` of a certificate.
pub fn public_key_der(der: &[u8]) -> Result<Vec<u8>, String> {
    let (_, cert) = parse_x509_certificate(der).map_err(|e| e.to_string())?;
    Ok(cert.public_key().raw.to_vec())
}
