mod support;

use assert_matches::assert_matches;
use base64::{engine::general_purpose::STANDARD, Engine};
use support::*;
use trustgate_tsl::{
    DomParser, DsigError, SignatureValidator, StreamingParser, TrustListParser,
    UncheckedSignatureValidator, XmlDsigValidator,
};

fn unsigned() -> String {
    territory_list("DE", "D-Trust GmbH")
}

#[test]
fn enveloped_signature_verifies() {
    let signed = sign_document(&unsigned());
    let verified = XmlDsigValidator::new()
        .verify(signed.xml.as_bytes())
        .expect("signature verifies");

    assert_eq!(verified.references, 1);
    assert!(verified
        .signer_subject
        .as_deref()
        .unwrap()
        .contains("Test Scheme Operator"));
    assert!(XmlDsigValidator::new().validate(signed.xml.as_bytes()));
}

#[test]
fn signature_block_does_not_change_parsed_content() {
    let xml = unsigned();
    let signed = sign_document(&xml);
    for parser in [&StreamingParser::new() as &dyn TrustListParser, &DomParser::new()] {
        assert_eq!(
            parser.parse(signed.xml.as_bytes()).unwrap(),
            parser.parse(xml.as_bytes()).unwrap()
        );
    }
}

#[test]
fn tampered_content_fails_the_digest() {
    let signed = sign_document(&unsigned());
    let tampered = signed.xml.replace("D-Trust GmbH", "Evil Trust GmbH");
    assert_matches!(
        XmlDsigValidator::new().verify(tampered.as_bytes()),
        Err(DsigError::DigestMismatch(uri)) if uri.is_empty()
    );
    assert!(!XmlDsigValidator::new().validate(tampered.as_bytes()));
}

#[test]
fn substituted_certificate_fails_the_signature() {
    let signed = sign_document(&unsigned());
    let (_, other) = test_certificate("Someone Else");
    let swapped = signed
        .xml
        .replace(&signed.certificate_b64, &STANDARD.encode(other));
    assert_matches!(
        XmlDsigValidator::new().verify(swapped.as_bytes()),
        Err(DsigError::SignatureMismatch)
    );
}

#[test]
fn missing_signature_is_invalid_but_unchecked_validator_accepts() {
    let xml = unsigned();
    assert_matches!(
        XmlDsigValidator::new().verify(xml.as_bytes()),
        Err(DsigError::NoSignature)
    );
    assert!(!XmlDsigValidator::new().validate(xml.as_bytes()));
    assert!(UncheckedSignatureValidator::new().validate(xml.as_bytes()));
}
