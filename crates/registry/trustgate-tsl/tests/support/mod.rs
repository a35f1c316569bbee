//! Trusted-list fixtures shared by the integration tests.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use p256::ecdsa::signature::Signer;
use p256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use trustgate_tsl::c14n::{canonicalize, C14nMode};
use trustgate_tsl::dsig::{algorithm, DSIG_NS};

pub const TSL_NS: &str = "http://uri.etsi.org/02231/v2#";
pub const TSL_MIME: &str = "application/vnd.etsi.tsl+xml";
pub const PDF_MIME: &str = "application/pdf";

const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

pub fn service(name: &str, type_uri: &str, status_uri: &str, subject: Option<&str>) -> String {
    let identity = subject
        .map(|s| {
            format!(
                "<tsl:ServiceDigitalIdentity><tsl:DigitalId><tsl:X509SubjectName>{}</tsl:X509SubjectName></tsl:DigitalId></tsl:ServiceDigitalIdentity>",
                s
            )
        })
        .unwrap_or_default();
    format!(
        r#"
        <tsl:TSPService>
          <tsl:ServiceInformation>
            <tsl:ServiceTypeIdentifier>{type_uri}</tsl:ServiceTypeIdentifier>
            <tsl:ServiceName><tsl:Name xml:lang="en">{name}</tsl:Name></tsl:ServiceName>
            {identity}
            <tsl:ServiceStatus>{status_uri}</tsl:ServiceStatus>
            <tsl:StatusStartingTime>2016-06-30T22:00:00Z</tsl:StatusStartingTime>
          </tsl:ServiceInformation>
          <tsl:ServiceHistory>
            <tsl:ServiceHistoryInstance>
              <tsl:ServiceTypeIdentifier>{type_uri}</tsl:ServiceTypeIdentifier>
              <tsl:ServiceName><tsl:Name xml:lang="en">{name} (previous)</tsl:Name></tsl:ServiceName>
              <tsl:ServiceStatus>http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/withdrawn</tsl:ServiceStatus>
              <tsl:StatusStartingTime>2010-01-01T00:00:00Z</tsl:StatusStartingTime>
            </tsl:ServiceHistoryInstance>
          </tsl:ServiceHistory>
        </tsl:TSPService>"#
    )
}

pub fn provider(name: &str, services: &[String]) -> String {
    format!(
        r#"
      <tsl:TrustServiceProvider>
        <tsl:TSPInformation>
          <tsl:TSPName><tsl:Name xml:lang="en">{name}</tsl:Name></tsl:TSPName>
        </tsl:TSPInformation>
        <tsl:TSPServices>{services}
        </tsl:TSPServices>
      </tsl:TrustServiceProvider>"#,
        services = services.concat()
    )
}

pub fn pointer(location: &str, territory: Option<&str>, mime: &str) -> String {
    let territory = territory
        .map(|t| {
            format!(
                "<tsl:OtherInformation><tsl:SchemeTerritory>{}</tsl:SchemeTerritory></tsl:OtherInformation>",
                t
            )
        })
        .unwrap_or_default();
    format!(
        r#"
        <tsl:OtherTSLPointer>
          <tsl:ServiceDigitalIdentities>
            <tsl:ServiceDigitalIdentity><tsl:DigitalId><tsl:X509SubjectName>CN=List signer</tsl:X509SubjectName></tsl:DigitalId></tsl:ServiceDigitalIdentity>
          </tsl:ServiceDigitalIdentities>
          <tsl:TSLLocation>{location}</tsl:TSLLocation>
          <tsl:AdditionalInformation>
            {territory}
            <tsl:OtherInformation><ns3:MimeType xmlns:ns3="http://uri.etsi.org/02231/v2/additionaltypes#">{mime}</ns3:MimeType></tsl:OtherInformation>
          </tsl:AdditionalInformation>
        </tsl:OtherTSLPointer>"#
    )
}

/// A complete list for `territory` with the given providers and pointers.
pub fn trusted_list(territory: &str, providers: &[String], pointers: &[String]) -> String {
    let pointers = if pointers.is_empty() {
        String::new()
    } else {
        format!(
            "\n    <tsl:PointersToOtherTSL>{}\n    </tsl:PointersToOtherTSL>",
            pointers.concat()
        )
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<tsl:TrustServiceStatusList xmlns:tsl="{TSL_NS}" Id="tsl-{territory}" TSLTag="http://uri.etsi.org/19612/TSLTag">
  <tsl:SchemeInformation>
    <tsl:TSLVersionIdentifier>5</tsl:TSLVersionIdentifier>
    <tsl:TSLSequenceNumber>42</tsl:TSLSequenceNumber>
    <tsl:SchemeOperatorName><tsl:Name xml:lang="en">Operator {territory}</tsl:Name></tsl:SchemeOperatorName>
    <tsl:SchemeTerritory>{territory}</tsl:SchemeTerritory>{pointers}
    <tsl:ListIssueDateTime>2024-05-01T00:00:00Z</tsl:ListIssueDateTime>
    <tsl:NextUpdate><tsl:dateTime>2024-11-01T00:00:00Z</tsl:dateTime></tsl:NextUpdate>
  </tsl:SchemeInformation>
  <tsl:TrustServiceProviderList>{providers}
  </tsl:TrustServiceProviderList>
</tsl:TrustServiceStatusList>
"#,
        providers = providers.concat()
    )
}

/// A territory list with a single granted qualified-CA provider.
pub fn territory_list(territory: &str, provider_name: &str) -> String {
    trusted_list(
        territory,
        &[provider(
            provider_name,
            &[service(
                &format!("{} Qualified CA", provider_name),
                "http://uri.etsi.org/TrstSvc/Svctype/CA/QC",
                "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/granted",
                Some(&format!("CN={} Root CA, C={}", provider_name, territory)),
            )],
        )],
        &[],
    )
}

/// Self-signed P-256 certificate for `common_name`, returned with its key.
pub fn test_certificate(common_name: &str) -> (rcgen::KeyPair, Vec<u8>) {
    let key_pair = rcgen::KeyPair::generate().expect("key pair");
    let mut params =
        rcgen::CertificateParams::new(vec!["tsl-signer.example".to_string()]).expect("params");
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    let cert = params.self_signed(&key_pair).expect("certificate");
    (key_pair, cert.der().to_vec())
}

pub struct SignedList {
    pub xml: String,
    pub certificate_b64: String,
}

/// Adds an enveloped ECDSA-SHA256 signature (exclusive c14n) just before the
/// document element's end tag.
pub fn sign_document(xml: &str) -> SignedList {
    let (key_pair, cert_der) = test_certificate("Test Scheme Operator");
    let certificate_b64 = STANDARD.encode(&cert_der);
    let signing_key =
        p256::ecdsa::SigningKey::from_pkcs8_der(&key_pair.serialize_der()).expect("pkcs8 key");

    let digest = {
        let doc = roxmltree::Document::parse(xml).expect("fixture parses");
        let canonical = canonicalize(doc.root(), C14nMode::Exclusive, None);
        STANDARD.encode(Sha256::digest(canonical.as_bytes()))
    };

    let signed_info = format!(
        r#"<ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{EXC_C14N}"/><ds:SignatureMethod Algorithm="{sig}"/><ds:Reference URI=""><ds:Transforms><ds:Transform Algorithm="{ENVELOPED}"/><ds:Transform Algorithm="{EXC_C14N}"/></ds:Transforms><ds:DigestMethod Algorithm="{sha}"/><ds:DigestValue>{digest}</ds:DigestValue></ds:Reference></ds:SignedInfo>"#,
        sig = algorithm::ECDSA_SHA256,
        sha = algorithm::SHA256,
    );
    let signature = |value: &str| {
        format!(
            r#"<ds:Signature xmlns:ds="{DSIG_NS}" Id="tsl-signature">{signed_info}<ds:SignatureValue>{value}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate_b64}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#
        )
    };

    let insert_at = xml.rfind("</").expect("document element end tag");
    let placeholder = format!("{}{}{}", &xml[..insert_at], signature("AA=="), &xml[insert_at..]);
    let value = {
        let doc = roxmltree::Document::parse(&placeholder).expect("signed fixture parses");
        let signed_info = doc
            .descendants()
            .find(|n| n.has_tag_name((DSIG_NS, "SignedInfo")))
            .expect("SignedInfo");
        let canonical = canonicalize(signed_info, C14nMode::Exclusive, None);
        let sig: p256::ecdsa::Signature = signing_key.sign(canonical.as_bytes());
        STANDARD.encode(sig.to_bytes())
    };

    SignedList {
        xml: format!("{}{}{}", &xml[..insert_at], signature(&value), &xml[insert_at..]),
        certificate_b64,
    }
}
