use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known ETSI TS 119 612 service status URIs.
pub mod status {
    pub const GRANTED: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/granted";
    pub const WITHDRAWN: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/withdrawn";
    pub const DEPRECATED_AT_NATIONAL_LEVEL: &str =
        "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/deprecatedatnationallevel";
    pub const RECOGNISED_AT_NATIONAL_LEVEL: &str =
        "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/recognisedatnationallevel";
}

/// Well-known ETSI TS 119 612 service type URIs.
pub mod service_type {
    pub const QUALIFIED_CA: &str = "http://uri.etsi.org/TrstSvc/Svctype/CA/QC";
    pub const CA_PKC: &str = "http://uri.etsi.org/TrstSvc/Svctype/CA/PKC";
    pub const QUALIFIED_VALIDATION: &str = "http://uri.etsi.org/TrstSvc/Svctype/QESValidation/Q";
    pub const QUALIFIED_PRESERVATION: &str = "http://uri.etsi.org/TrstSvc/Svctype/PSES/Q";
    pub const QUALIFIED_TIMESTAMP: &str = "http://uri.etsi.org/TrstSvc/Svctype/TSA/QTST";
    pub const TIMESTAMP_AUTHORITY: &str = "http://uri.etsi.org/TrstSvc/Svctype/TSA";
    pub const QUALIFIED_EDS: &str = "http://uri.etsi.org/TrstSvc/Svctype/EDS/Q";
    pub const QUALIFIED_REM: &str = "http://uri.etsi.org/TrstSvc/Svctype/EDS/REM/Q";

    /// Path fragment shared by every qualified service type.
    pub const QUALIFIED_MARKER: &str = "/Q";
}

/// A parsed trusted list: either the root list of lists or one territory's list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustedListDocument {
    /// `SchemeTerritory` of the scheme information block (e.g. `"DE"`, `"EU"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_update: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,

    #[serde(default)]
    pub providers: Vec<Provider>,

    #[serde(default)]
    pub pointers: Vec<ListPointer>,
}

impl TrustedListDocument {
    /// Total number of services across all providers.
    pub fn service_count(&self) -> usize {
        self.providers.iter().map(|p| p.services.len()).sum()
    }
}

/// A trust service provider (`TrustServiceProvider`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_name: Option<String>,

    /// Territory of the list this provider was aggregated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territory: Option<String>,

    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

impl Provider {
    /// Returns the provider tagged with `territory`, replacing any previous tag.
    pub fn with_territory(mut self, territory: impl Into<String>) -> Self {
        self.territory = Some(territory.into());
        self
    }
}

/// A single `TSPService` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub service_type: String,
    pub service_name: String,
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_starting_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_identity: Option<TrustAnchorInfo>,
}

impl ServiceEntry {
    pub fn is_granted(&self) -> bool {
        self.status == status::GRANTED
    }

    pub fn is_withdrawn(&self) -> bool {
        self.status == status::WITHDRAWN
    }

    pub fn is_qualified(&self) -> bool {
        self.service_type.contains(service_type::QUALIFIED_MARKER)
    }

    /// Last path segment of the status URI, e.g. `"granted"`.
    pub fn status_label(&self) -> &str {
        self.status.rsplit('/').next().unwrap_or(&self.status)
    }

    pub fn subject_name(&self) -> Option<&str> {
        self.digital_identity
            .as_ref()
            .and_then(|id| id.subject_name.as_deref())
    }
}

/// Identity material from a service's `ServiceDigitalIdentity`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchorInfo {
    /// Base64 DER certificate with all whitespace removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,

    /// Base64 subject key identifier (`X509SKI`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_identifier: Option<String>,
}

impl TrustAnchorInfo {
    pub fn is_empty(&self) -> bool {
        self.certificate.is_none() && self.subject_name.is_none() && self.key_identifier.is_none()
    }

    /// Decoded certificate bytes, if the certificate is present and well formed.
    pub fn certificate_der(&self) -> Option<Vec<u8>> {
        self.certificate
            .as_deref()
            .and_then(|b64| STANDARD.decode(b64).ok())
    }

    /// Whether `der` is byte-identical to the carried certificate.
    pub fn matches_certificate(&self, der: &[u8]) -> bool {
        self.certificate_der().map_or(false, |own| own == der)
    }
}

/// An `OtherTSLPointer` from the "pointers to other lists" block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPointer {
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ListPointer {
    /// A pointer with no declared MIME type is assumed to be XML.
    pub fn is_xml(&self) -> bool {
        self.mime_type
            .as_deref()
            .map_or(true, |m| m.to_ascii_lowercase().contains("xml"))
    }
}
