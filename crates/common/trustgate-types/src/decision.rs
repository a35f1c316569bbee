use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The independent registries a decision can be based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustSource {
    /// ETSI TS 119 612 trusted lists.
    EtsiTrustList,
    /// OpenID-Federation trust chains.
    OpenidFederation,
}

impl TrustSource {
    pub const ALL: [TrustSource; 2] = [TrustSource::EtsiTrustList, TrustSource::OpenidFederation];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustSource::EtsiTrustList => "etsi_trust_list",
            TrustSource::OpenidFederation => "openid_federation",
        }
    }
}

impl fmt::Display for TrustSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to "is this issuer/verifier trusted", with the evidence behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustDecision {
    pub trusted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TrustSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,

    #[serde(default)]
    pub evidence: BTreeMap<String, String>,
}

impl TrustDecision {
    pub fn untrusted() -> Self {
        Self::default()
    }

    pub fn trusted_by(source: TrustSource) -> Self {
        Self {
            trusted: true,
            source: Some(source),
            ..Self::default()
        }
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn with_territory(mut self, territory: Option<String>) -> Self {
        self.territory = territory;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_validity(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_until = valid_until;
        self
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }
}

/// Health of a single trust source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub enabled: bool,
    pub healthy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,

    pub entry_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceHealth {
    /// What a disabled source reports, regardless of its cached state.
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Health across all sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateHealth {
    /// True iff at least one enabled source is healthy.
    pub healthy: bool,
    pub sources: BTreeMap<TrustSource, SourceHealth>,
}

impl AggregateHealth {
    pub fn from_sources(sources: BTreeMap<TrustSource, SourceHealth>) -> Self {
        let healthy = sources.values().any(|h| h.enabled && h.healthy);
        Self { healthy, sources }
    }

    pub fn source(&self, source: TrustSource) -> Option<&SourceHealth> {
        self.sources.get(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_needs_an_enabled_healthy_source() {
        let mut sources = BTreeMap::new();
        sources.insert(
            TrustSource::EtsiTrustList,
            SourceHealth {
                enabled: false,
                healthy: true,
                entry_count: 12,
                ..Default::default()
            },
        );
        sources.insert(TrustSource::OpenidFederation, SourceHealth::disabled());
        assert!(!AggregateHealth::from_sources(sources.clone()).healthy);

        sources.insert(
            TrustSource::OpenidFederation,
            SourceHealth {
                enabled: true,
                healthy: true,
                entry_count: 1,
                ..Default::default()
            },
        );
        let health = AggregateHealth::from_sources(sources);
        assert!(health.healthy);
        assert_eq!(health.source(TrustSource::OpenidFederation).map(|h| h.entry_count), Some(1));
    }

    #[test]
    fn decision_and_health_round_trip_through_json() {
        let decision = TrustDecision::trusted_by(TrustSource::EtsiTrustList)
            .with_provider_name("D-Trust GmbH")
            .with_territory(Some("DE".into()))
            .with_status("granted")
            .with_evidence("service_type", "http://uri.etsi.org/TrstSvc/Svctype/CA/QC");
        let back: TrustDecision =
            serde_json::from_str(&serde_json::to_string(&decision).unwrap()).unwrap();
        assert_eq!(back, decision);

        let mut sources = BTreeMap::new();
        sources.insert(TrustSource::EtsiTrustList, SourceHealth::disabled());
        let health = AggregateHealth::from_sources(sources);
        let json = serde_json::to_string(&health).unwrap();
        assert!(json.contains("etsi_trust_list"));
        let back: AggregateHealth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, health);
    }

    #[test]
    fn untrusted_is_empty() {
        let d = TrustDecision::untrusted();
        assert!(!d.trusted);
        assert!(d.source.is_none());
        assert!(d.evidence.is_empty());
    }
}
