//! Event-driven assembly of a [`TrustedListDocument`].
//!
//! Both parser strategies reduce their input to the same three events (element
//! start by local name, character data, element end), so the extraction rules
//! live here once and the strategies cannot drift apart.

use crate::certificate;
use chrono::{DateTime, NaiveDateTime, Utc};
use trustgate_types::{
    ListPointer, ParseError, Provider, ServiceEntry, TrustAnchorInfo, TrustedListDocument,
};

const ROOT_ELEMENT: &str = "TrustServiceStatusList";

#[derive(Debug, Default)]
pub(crate) struct TrustListBuilder {
    path: Vec<String>,
    text: String,
    root_seen: bool,
    doc: TrustedListDocument,
    pointer: Option<ListPointer>,
    provider: Option<Provider>,
    service: Option<ServiceEntry>,
    identity: TrustAnchorInfo,
}

impl TrustListBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start_element(&mut self, local_name: &str) -> Result<(), ParseError> {
        if !self.root_seen {
            if local_name != ROOT_ELEMENT {
                return Err(ParseError::UnexpectedRoot(local_name.to_string()));
            }
            self.root_seen = true;
        } else if self.path.is_empty() {
            return Err(ParseError::Xml(format!(
                "element <{}> after the document element",
                local_name
            )));
        }

        match local_name {
            "OtherTSLPointer" if self.inside("PointersToOtherTSL") => {
                self.pointer = Some(ListPointer::default());
            }
            "TrustServiceProvider" => {
                self.provider = Some(Provider::default());
            }
            "TSPService" if self.provider.is_some() => {
                self.service = Some(ServiceEntry::default());
                self.identity = TrustAnchorInfo::default();
            }
            _ => {}
        }

        self.path.push(local_name.to_string());
        self.text.clear();
        Ok(())
    }

    /// Character data; only whitespace may appear outside the document element.
    pub(crate) fn text(&mut self, text: &str) -> Result<(), ParseError> {
        if self.path.is_empty() {
            if !text.trim().is_empty() {
                return Err(ParseError::Xml(
                    "character data outside the document element".to_string(),
                ));
            }
            return Ok(());
        }
        self.text.push_str(text);
        Ok(())
    }

    pub(crate) fn end_element(&mut self) {
        let value = self.text.trim().to_string();
        self.text.clear();

        if let Some(name) = self.path.last().cloned() {
            let parent = self.parent().map(str::to_string);
            self.assign(&name, parent.as_deref(), value);
            self.close(&name);
        }
        self.path.pop();
    }

    pub(crate) fn finish(self) -> Result<TrustedListDocument, ParseError> {
        if !self.root_seen {
            return Err(ParseError::Empty);
        }
        if !self.path.is_empty() {
            return Err(ParseError::Xml(format!(
                "unexpected end of document inside <{}>",
                self.path.join("/")
            )));
        }
        Ok(self.doc)
    }

    fn inside(&self, element: &str) -> bool {
        self.path.iter().any(|p| p == element)
    }

    fn parent(&self) -> Option<&str> {
        let len = self.path.len();
        if len >= 2 {
            Some(self.path[len - 2].as_str())
        } else {
            None
        }
    }

    /// Routes a completed element's text to the field it populates.
    fn assign(&mut self, name: &str, parent: Option<&str>, value: String) {
        if value.is_empty() || self.inside("Signature") {
            return;
        }

        if let Some(pointer) = self.pointer.as_mut() {
            match name {
                "TSLLocation" => set_first(&mut pointer.location, value),
                "SchemeTerritory" => set_first_opt(&mut pointer.territory, value),
                "MimeType" => set_first_opt(&mut pointer.mime_type, value),
                _ => {}
            }
            return;
        }

        if self.service.is_some() {
            // History instances repeat these tags with superseded values.
            if self.inside("ServiceHistory") {
                return;
            }
            let identity = &mut self.identity;
            if let Some(service) = self.service.as_mut() {
                match (name, parent) {
                    ("ServiceTypeIdentifier", _) => set_first(&mut service.service_type, value),
                    ("Name", Some("ServiceName")) => set_first(&mut service.service_name, value),
                    ("ServiceStatus", _) => set_first(&mut service.status, value),
                    ("StatusStartingTime", _) => {
                        if service.status_starting_time.is_none() {
                            service.status_starting_time = parse_timestamp(&value);
                        }
                    }
                    ("X509Certificate", _) => set_first_opt(
                        &mut identity.certificate,
                        value.split_whitespace().collect(),
                    ),
                    ("X509SubjectName", _) => set_first_opt(&mut identity.subject_name, value),
                    ("X509SKI", _) => set_first_opt(&mut identity.key_identifier, value),
                    _ => {}
                }
            }
            return;
        }

        if let Some(provider) = self.provider.as_mut() {
            match (name, parent) {
                ("Name", Some("TSPName")) => set_first(&mut provider.name, value),
                ("Name", Some("TSPTradeName")) => set_first_opt(&mut provider.trade_name, value),
                _ => {}
            }
            return;
        }

        if self.inside("SchemeInformation") && !self.inside("PointersToOtherTSL") {
            let doc = &mut self.doc;
            match (name, parent) {
                ("SchemeTerritory", _) => set_first_opt(&mut doc.territory, value),
                ("Name", Some("SchemeOperatorName")) => set_first_opt(&mut doc.operator_name, value),
                ("TSLSequenceNumber", _) => {
                    if doc.sequence_number.is_none() {
                        doc.sequence_number = value.parse().ok();
                    }
                }
                ("ListIssueDateTime", _) => {
                    if doc.issue_date.is_none() {
                        doc.issue_date = parse_timestamp(&value);
                    }
                }
                ("dateTime", Some("NextUpdate")) | ("NextUpdate", _) => {
                    if doc.next_update.is_none() {
                        doc.next_update = parse_timestamp(&value);
                    }
                }
                _ => {}
            }
        }
    }

    /// Emits the record an element delimits once it closes.
    fn close(&mut self, name: &str) {
        match name {
            "OtherTSLPointer" => {
                if let Some(pointer) = self.pointer.take() {
                    if pointer.location.is_empty() {
                        tracing::debug!("Dropping trusted-list pointer without a TSLLocation");
                    } else {
                        self.doc.pointers.push(pointer);
                    }
                }
            }
            "TSPService" => {
                if let Some(mut service) = self.service.take() {
                    let mut identity = std::mem::take(&mut self.identity);
                    if identity.subject_name.is_none() {
                        identity.subject_name = identity
                            .certificate
                            .as_deref()
                            .and_then(certificate::subject_from_base64);
                    }
                    if !identity.is_empty() {
                        service.digital_identity = Some(identity);
                    }
                    if let Some(provider) = self.provider.as_mut() {
                        provider.services.push(service);
                    }
                }
            }
            "TrustServiceProvider" => {
                if let Some(provider) = self.provider.take() {
                    self.doc.providers.push(provider);
                }
            }
            _ => {}
        }
    }
}

fn set_first(field: &mut String, value: String) {
    if field.is_empty() {
        *field = value;
    }
}

fn set_first_opt(field: &mut Option<String>, value: String) {
    if field.is_none() && !value.is_empty() {
        *field = Some(value);
    }
}

/// Lenient `xsd:dateTime` parsing; anything unparsable becomes `None`.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            tracing::debug!("Ignoring unparsable trusted-list timestamp {:?}", raw);
            None
        })
}
