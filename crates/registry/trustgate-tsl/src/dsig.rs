//! Enveloped XML-DSig validation for trusted lists.
//!
//! The verification key comes from the `X509Certificate` inside the
//! signature's own `KeyInfo`. A passing check shows the document is
//! internally consistent with that certificate; it says nothing about who
//! issued the certificate. Pin the transport source if provenance matters.

use crate::c14n::{canonicalize_with, parse_prefix_list, C14nMode, EXC_C14N_NS};
use crate::certificate;
use crate::parser::dom::{hardened_options, map_dom_error};
use base64::{engine::general_purpose::STANDARD, Engine};
use roxmltree::{Document, Node, NodeId};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::collections::BTreeSet;
use thiserror::Error;

pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

pub mod algorithm {
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";

    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";
}

/// Why a document's signature did not verify.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DsigError {
    #[error("document has no ds:Signature element")]
    NoSignature,

    #[error("document could not be parsed: {0}")]
    Document(String),

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("reference {0:?} does not resolve to exactly one element")]
    UnresolvedReference(String),

    #[error("identifier {0:?} is declared more than once")]
    DuplicateId(String),

    #[error("digest mismatch for reference {0:?}")]
    DigestMismatch(String),

    #[error("signing certificate is unusable: {0}")]
    Certificate(String),

    #[error("signature value does not verify against the embedded certificate")]
    SignatureMismatch,
}

/// Summary of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub signature_method: String,
    pub signer_subject: Option<String>,
    pub references: usize,
}

/// Checks the signature embedded in a trusted list.
pub trait SignatureValidator: Send + Sync {
    /// `true` iff the document carries a signature that verifies.
    fn validate(&self, bytes: &[u8]) -> bool;

    fn name(&self) -> &'static str;
}

/// Real XML-DSig verification using the certificate carried in `KeyInfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlDsigValidator;

impl XmlDsigValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn verify(&self, bytes: &[u8]) -> Result<VerifiedSignature, DsigError> {
        let text = crate::parser::decode_utf8(bytes)
            .map_err(|e| DsigError::Document(e.to_string()))?;
        let doc = Document::parse_with_options(text, hardened_options())
            .map_err(|e| DsigError::Document(map_dom_error(e).to_string()))?;

        let signature = doc
            .descendants()
            .find(|n| is_dsig(n, "Signature"))
            .ok_or(DsigError::NoSignature)?;
        let signed_info = required_child(signature, "SignedInfo")?;

        let c14n_method = required_child(signed_info, "CanonicalizationMethod")?;
        let c14n_uri = algorithm_of(c14n_method)?;
        let c14n_mode = C14nMode::from_algorithm(c14n_uri)
            .ok_or_else(|| DsigError::UnsupportedAlgorithm(c14n_uri.to_string()))?;
        let c14n_prefixes = inclusive_prefixes(c14n_method, c14n_mode);
        let signature_method =
            algorithm_of(required_child(signed_info, "SignatureMethod")?)?.to_string();

        let mut references = 0;
        for reference in signed_info.children().filter(|n| is_dsig(n, "Reference")) {
            verify_reference(&doc, signature.id(), reference)?;
            references += 1;
        }
        if references == 0 {
            return Err(DsigError::Malformed("SignedInfo has no Reference".into()));
        }

        let signature_value = decode_base64(required_child(signature, "SignatureValue")?)?;
        let cert_der = signature
            .descendants()
            .find(|n| is_dsig(n, "X509Certificate"))
            .ok_or_else(|| DsigError::Certificate("KeyInfo carries no X509Certificate".into()))
            .and_then(decode_base64)?;
        let spki = certificate::public_key_der(&cert_der).map_err(DsigError::Certificate)?;

        let canonical_signed_info = canonicalize_with(signed_info, c14n_mode, None, &c14n_prefixes);
        verify_signature(
            &signature_method,
            &spki,
            canonical_signed_info.as_bytes(),
            &signature_value,
        )?;

        Ok(VerifiedSignature {
            signature_method,
            signer_subject: certificate::subject_name(&cert_der),
            references,
        })
    }
}

impl SignatureValidator for XmlDsigValidator {
    fn validate(&self, bytes: &[u8]) -> bool {
        match self.verify(bytes) {
            Ok(verified) => {
                tracing::debug!(
                    "Trusted-list signature verified ({}, signer {:?})",
                    verified.signature_method,
                    verified.signer_subject
                );
                true
            }
            Err(e) => {
                tracing::debug!("Trusted-list signature rejected: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "xmldsig"
    }
}

/// Accepts every document. For builds that cannot verify XML signatures; each
/// call is logged so the gap stays visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct UncheckedSignatureValidator;

impl UncheckedSignatureValidator {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureValidator for UncheckedSignatureValidator {
    fn validate(&self, _bytes: &[u8]) -> bool {
        tracing::warn!(
            "Trusted-list signature NOT verified: unchecked validator in use, document accepted as valid"
        );
        true
    }

    fn name(&self) -> &'static str {
        "unchecked"
    }
}

fn is_dsig(node: &Node<'_, '_>, local: &str) -> bool {
    node.is_element() && node.tag_name().namespace() == Some(DSIG_NS) && node.tag_name().name() == local
}

fn required_child<'a, 'i>(parent: Node<'a, 'i>, local: &str) -> Result<Node<'a, 'i>, DsigError> {
    parent
        .children()
        .find(|n| is_dsig(n, local))
        .ok_or_else(|| DsigError::Malformed(format!("missing ds:{}", local)))
}

fn algorithm_of<'a>(node: Node<'a, '_>) -> Result<&'a str, DsigError> {
    node.attribute("Algorithm").ok_or_else(|| {
        DsigError::Malformed(format!("ds:{} without Algorithm", node.tag_name().name()))
    })
}

fn decode_base64(node: Node<'_, '_>) -> Result<Vec<u8>, DsigError> {
    let compact: String = node.text().unwrap_or_default().split_whitespace().collect();
    STANDARD
        .decode(compact)
        .map_err(|e| DsigError::Malformed(format!("ds:{}: {}", node.tag_name().name(), e)))
}

/// The `InclusiveNamespaces PrefixList` of an exclusive C14N method or transform.
fn inclusive_prefixes(method: Node<'_, '_>, mode: C14nMode) -> BTreeSet<String> {
    if !mode.is_exclusive() {
        return BTreeSet::new();
    }
    method
        .children()
        .find(|n| n.tag_name().namespace() == Some(EXC_C14N_NS) && n.has_tag_name("InclusiveNamespaces"))
        .and_then(|n| n.attribute("PrefixList"))
        .map(parse_prefix_list)
        .unwrap_or_default()
}

fn verify_reference(doc: &Document<'_>, signature: NodeId, reference: Node<'_, '_>) -> Result<(), DsigError> {
    let uri = reference.attribute("URI").unwrap_or("");
    let target = resolve_reference(doc, uri)?;

    let mut mode = C14nMode::Inclusive;
    let mut prefixes = BTreeSet::new();
    let mut excluded = None;
    if let Some(transforms) = reference.children().find(|n| is_dsig(n, "Transforms")) {
        for transform in transforms.children().filter(|n| is_dsig(n, "Transform")) {
            let algorithm = algorithm_of(transform)?;
            if algorithm == ENVELOPED_SIGNATURE {
                excluded = Some(signature);
            } else if let Some(m) = C14nMode::from_algorithm(algorithm) {
                mode = m;
                prefixes = inclusive_prefixes(transform, m);
            } else {
                return Err(DsigError::UnsupportedAlgorithm(algorithm.to_string()));
            }
        }
    }

    let digest_method = algorithm_of(required_child(reference, "DigestMethod")?)?;
    let expected = decode_base64(required_child(reference, "DigestValue")?)?;

    let canonical = canonicalize_with(target, mode, excluded, &prefixes);
    let actual = digest(digest_method, canonical.as_bytes())?;
    if actual != expected {
        return Err(DsigError::DigestMismatch(uri.to_string()));
    }
    Ok(())
}

/// `""` is the whole document; `#id` must name exactly one element.
fn resolve_reference<'a, 'i>(doc: &'a Document<'i>, uri: &str) -> Result<Node<'a, 'i>, DsigError> {
    if uri.is_empty() {
        return Ok(doc.root());
    }
    let id = uri
        .strip_prefix('#')
        .ok_or_else(|| DsigError::UnsupportedAlgorithm(format!("external reference {}", uri)))?;

    let mut matches = doc.descendants().filter(|n| {
        n.is_element()
            && n.attributes()
                .any(|a| matches!(a.name(), "Id" | "ID" | "id") && a.value() == id)
    });
    let first = matches
        .next()
        .ok_or_else(|| DsigError::UnresolvedReference(uri.to_string()))?;
    if matches.next().is_some() {
        return Err(DsigError::DuplicateId(id.to_string()));
    }
    Ok(first)
}

fn digest(algorithm: &str, data: &[u8]) -> Result<Vec<u8>, DsigError> {
    match algorithm {
        algorithm::SHA256 => Ok(Sha256::digest(data).to_vec()),
        algorithm::SHA384 => Ok(Sha384::digest(data).to_vec()),
        algorithm::SHA512 => Ok(Sha512::digest(data).to_vec()),
        other => Err(DsigError::UnsupportedAlgorithm(other.to_string())),
    }
}

fn verify_signature(algorithm: &str, spki: &[u8], message: &[u8], signature: &[u8]) -> Result<(), DsigError> {
    match algorithm {
        algorithm::RSA_SHA256 => verify_rsa::<Sha256>(spki, message, signature),
        algorithm::RSA_SHA384 => verify_rsa::<Sha384>(spki, message, signature),
        algorithm::RSA_SHA512 => verify_rsa::<Sha512>(spki, message, signature),
        algorithm::ECDSA_SHA256 => {
            let key = p256::ecdsa::VerifyingKey::from_public_key_der(spki)
                .map_err(|e| DsigError::Certificate(e.to_string()))?;
            // XML-DSig carries ECDSA signatures as raw r || s.
            let sig = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|e| DsigError::Malformed(format!("ECDSA signature: {}", e)))?;
            key.verify(message, &sig)
                .map_err(|_| DsigError::SignatureMismatch)
        }
        other => Err(DsigError::UnsupportedAlgorithm(other.to_string())),
    }
}

fn verify_rsa<D>(spki: &[u8], message: &[u8], signature: &[u8]) -> Result<(), DsigError>
where
    D: Digest + rsa::pkcs8::der::oid::AssociatedOid,
{
    let key = rsa::RsaPublicKey::from_public_key_der(spki)
        .map_err(|e| DsigError::Certificate(e.to_string()))?;
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(key);
    let sig = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| DsigError::Malformed(format!("RSA signature: {}", e)))?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| DsigError::SignatureMismatch)
}
