use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trustgate_service::{CompositeTrustService, FederationSource, TrustListSource};
use trustgate_types::{
    service_type, status, EntityStatement, Provider, ServiceEntry, SourceHealth, TransportError,
    TrustAnchorInfo, TrustChain, TrustListError, TrustSource,
};

const ANCHOR: &str = "https://anchor.example";
const LEAF: &str = "https://wallet-provider.example";

#[derive(Default)]
struct SpyTrustList {
    providers: Vec<Provider>,
    fail: bool,
    provider_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

#[async_trait]
impl TrustListSource for SpyTrustList {
    async fn providers(&self) -> Result<Arc<Vec<Provider>>, TrustListError> {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TrustListError::Fetch {
                url: "https://lotl.example/list.xml".into(),
                source: TransportError::Status {
                    url: "https://lotl.example/list.xml".into(),
                    status: 503,
                },
            });
        }
        Ok(Arc::new(self.providers.clone()))
    }

    async fn refresh(&self) -> Result<usize, TrustListError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.providers.len())
    }

    async fn health(&self) -> SourceHealth {
        SourceHealth {
            enabled: true,
            healthy: !self.fail,
            entry_count: self.providers.len(),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct SpyFederation {
    anchors: bool,
    chains: Mutex<Vec<TrustChain>>,
    resolve_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl SpyFederation {
    fn with_chain(chain: TrustChain) -> Self {
        Self {
            anchors: true,
            chains: Mutex::new(vec![chain]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl FederationSource for SpyFederation {
    fn has_trust_anchors(&self) -> bool {
        self.anchors
    }

    async fn resolve_chain(&self, entity_id: &str) -> Option<TrustChain> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if !self.anchors {
            return None;
        }
        let chains = self.chains.lock().unwrap();
        Some(
            chains
                .iter()
                .find(|c| c.entity_id == entity_id)
                .cloned()
                .unwrap_or_else(|| TrustChain::unresolved(entity_id, Vec::new(), "unknown entity")),
        )
    }

    async fn refresh(&self) -> usize {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        usize::from(self.anchors)
    }

    async fn health(&self) -> SourceHealth {
        SourceHealth {
            enabled: self.anchors,
            healthy: self.anchors,
            entry_count: usize::from(self.anchors),
            ..Default::default()
        }
    }
}

fn qualified_ca(name: &str, status_uri: &str, subject: &str, certificate: Option<&str>) -> ServiceEntry {
    ServiceEntry {
        service_type: service_type::QUALIFIED_CA.into(),
        service_name: name.into(),
        status: status_uri.into(),
        status_starting_time: Some("2016-06-30T22:00:00Z".parse().unwrap()),
        digital_identity: Some(TrustAnchorInfo {
            certificate: certificate.map(str::to_string),
            subject_name: Some(subject.into()),
            key_identifier: None,
        }),
    }
}

fn listed_providers() -> Vec<Provider> {
    vec![Provider {
        name: "D-Trust GmbH".into(),
        territory: Some("DE".into()),
        services: vec![qualified_ca(
            "D-TRUST Root CA 3",
            status::GRANTED,
            "CN=D-TRUST Root CA 3 2016, O=D-Trust GmbH, C=DE",
            Some("3q2+7w=="),
        )],
        ..Default::default()
    }]
}

fn leaf_chain() -> TrustChain {
    let mut leaf = EntityStatement::new(LEAF, LEAF);
    leaf.issued_at = Some(1_700_000_000);
    leaf.expires_at = Some(1_900_000_000);
    leaf.metadata = serde_json::json!({
        "federation_entity": { "organization_name": "Example Wallet Ltd" }
    })
    .as_object()
    .cloned();
    let mut vouch = EntityStatement::new(ANCHOR, LEAF);
    vouch.expires_at = Some(1_800_000_000);
    TrustChain::resolved(LEAF, ANCHOR, vec![leaf, vouch])
}

fn composite(
    trust_list: SpyTrustList,
    federation: SpyFederation,
) -> (CompositeTrustService, Arc<SpyTrustList>, Arc<SpyFederation>) {
    let trust_list = Arc::new(trust_list);
    let federation = Arc::new(federation);
    let service = CompositeTrustService::new(trust_list.clone(), federation.clone());
    (service, trust_list, federation)
}

#[tokio::test]
async fn absent_issuer_consults_no_source() {
    let (service, trust_list, federation) = composite(
        SpyTrustList {
            providers: listed_providers(),
            ..Default::default()
        },
        SpyFederation::with_chain(leaf_chain()),
    );

    for issuer in [None, Some(""), Some("   ")] {
        let decision = service.validate_issuer(issuer).await;
        assert!(!decision.trusted);
        assert!(decision.source.is_none());
    }
    assert_eq!(trust_list.provider_calls.load(Ordering::SeqCst), 0);
    assert_eq!(federation.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listed_provider_is_trusted_with_service_evidence() {
    let (service, _, federation) = composite(
        SpyTrustList {
            providers: listed_providers(),
            ..Default::default()
        },
        SpyFederation::default(),
    );

    let decision = service.validate_issuer(Some("D-TRUST GMBH")).await;
    assert!(decision.trusted);
    assert_eq!(decision.source, Some(TrustSource::EtsiTrustList));
    assert_eq!(decision.territory.as_deref(), Some("DE"));
    assert_eq!(decision.status.as_deref(), Some("granted"));
    assert_eq!(decision.evidence["service_type"], service_type::QUALIFIED_CA);
    assert_eq!(
        decision.valid_from.map(|d| d.to_rfc3339()),
        Some("2016-06-30T22:00:00+00:00".to_string())
    );
    assert_eq!(federation.resolve_calls.load(Ordering::SeqCst), 0);

    let by_subject = service.validate_issuer(Some("D-TRUST Root CA 3 2016")).await;
    assert!(by_subject.trusted);
    assert_eq!(by_subject.evidence["matched_on"], "subject_name");
}

#[tokio::test]
async fn unknown_issuer_is_explicitly_untrusted() {
    let (service, _, _) = composite(
        SpyTrustList {
            providers: listed_providers(),
            ..Default::default()
        },
        SpyFederation::default(),
    );
    let decision = service.validate_issuer(Some("Unlisted CA")).await;
    assert_eq!(decision, trustgate_types::TrustDecision::untrusted());
}

#[tokio::test]
async fn trust_list_failure_degrades_to_no_match() {
    let (service, trust_list, _) = composite(
        SpyTrustList {
            providers: listed_providers(),
            fail: true,
            ..Default::default()
        },
        SpyFederation::default(),
    );
    assert!(!service.validate_issuer(Some("D-Trust GmbH")).await.trusted);
    assert_eq!(trust_list.provider_calls.load(Ordering::SeqCst), 1);

    let status = service.get_status().await;
    assert!(!status.healthy);
    assert!(status.sources[&TrustSource::EtsiTrustList].enabled);
}

#[tokio::test]
async fn federation_resolves_entities_missing_from_the_list() {
    let (service, _, federation) = composite(
        SpyTrustList {
            providers: listed_providers(),
            ..Default::default()
        },
        SpyFederation::with_chain(leaf_chain()),
    );

    let decision = service.validate_issuer(Some(LEAF)).await;
    assert!(decision.trusted);
    assert_eq!(decision.source, Some(TrustSource::OpenidFederation));
    assert_eq!(decision.provider_name.as_deref(), Some("Example Wallet Ltd"));
    assert_eq!(decision.evidence["trust_anchor"], ANCHOR);
    assert_eq!(decision.evidence["chain_length"], "2");
    assert_eq!(decision.valid_from.map(|d| d.timestamp()), Some(1_700_000_000));
    // The earliest expiry in the chain bounds the decision.
    assert_eq!(decision.valid_until.map(|d| d.timestamp()), Some(1_800_000_000));

    let unknown = service.validate_issuer(Some("https://stranger.example")).await;
    assert!(!unknown.trusted);

    // Plain names are never looked up as federation entities.
    service.validate_issuer(Some("Unlisted CA")).await;
    assert_eq!(federation.resolve_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn disabled_source_is_skipped_and_reported_empty() {
    let (service, trust_list, federation) = composite(
        SpyTrustList {
            providers: listed_providers(),
            ..Default::default()
        },
        SpyFederation::with_chain(leaf_chain()),
    );

    service.set_enabled(TrustSource::EtsiTrustList, false);
    assert!(!service.validate_issuer(Some("D-Trust GmbH")).await.trusted);
    assert_eq!(trust_list.provider_calls.load(Ordering::SeqCst), 0);

    let status = service.get_status().await;
    let list = &status.sources[&TrustSource::EtsiTrustList];
    assert!(!list.enabled);
    assert!(!list.healthy);
    assert_eq!(list.entry_count, 0);
    assert!(status.healthy, "federation is still enabled and healthy");

    service.set_enabled(TrustSource::OpenidFederation, false);
    assert!(!service.validate_issuer(Some(LEAF)).await.trusted);
    assert_eq!(federation.resolve_calls.load(Ordering::SeqCst), 0);
    assert!(!service.get_status().await.healthy);

    service.set_enabled(TrustSource::EtsiTrustList, true);
    assert!(service.validate_issuer(Some("D-Trust GmbH")).await.trusted);
}

#[tokio::test]
async fn federation_defaults_to_disabled_without_anchors() {
    let (service, _, federation) = composite(SpyTrustList::default(), SpyFederation::default());
    assert!(service.is_enabled(TrustSource::EtsiTrustList));
    assert!(!service.is_enabled(TrustSource::OpenidFederation));

    assert!(!service.validate_issuer(Some(LEAF)).await.trusted);
    assert_eq!(federation.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn verifier_matches_subject_or_presented_certificate() {
    let (service, _, _) = composite(
        SpyTrustList {
            providers: listed_providers(),
            ..Default::default()
        },
        SpyFederation::with_chain(leaf_chain()),
    );

    let by_subject = service.validate_verifier("O=D-Trust GmbH", None).await;
    assert!(by_subject.trusted);

    let partial = service.validate_verifier("D-TRUST Root", None).await;
    assert!(partial.trusted);
    assert!(!service.validate_verifier("Unlisted RP", None).await.trusted);

    let certificate = vec![vec![0xde, 0xad, 0xbe, 0xef]];
    let by_cert = service
        .validate_verifier("https://rp.example", Some(certificate.as_slice()))
        .await;
    assert!(by_cert.trusted);
    assert_eq!(by_cert.evidence["matched_on"], "certificate");

    let federated = service.validate_verifier(LEAF, Some(&[][..])).await;
    assert_eq!(federated.source, Some(TrustSource::OpenidFederation));

    assert!(!service.validate_verifier("", None).await.trusted);
}

#[tokio::test]
async fn refresh_only_touches_enabled_sources() {
    let (service, trust_list, federation) = composite(
        SpyTrustList {
            providers: listed_providers(),
            ..Default::default()
        },
        SpyFederation::with_chain(leaf_chain()),
    );

    let status = service.refresh().await;
    assert!(status.healthy);
    assert_eq!(trust_list.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(federation.refresh_calls.load(Ordering::SeqCst), 1);

    service.set_enabled(TrustSource::OpenidFederation, false);
    service.refresh().await;
    assert_eq!(trust_list.refresh_calls.load(Ordering::SeqCst), 2);
    assert_eq!(federation.refresh_calls.load(Ordering::SeqCst), 1);
}
