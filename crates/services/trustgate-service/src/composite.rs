use crate::matching::{match_issuer, match_verifier};
use crate::metrics;
use crate::source::{FederationSource, TrustListSource};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trustgate_federation::FederationService;
use trustgate_transport::RegistryTransport;
use trustgate_tsl::TrustListService;
use trustgate_types::{AggregateHealth, SourceHealth, TrustChain, TrustConfig, TrustDecision, TrustSource};

/// One trust interface over the trusted-list and federation sources.
///
/// Never returns an error: source failures are logged and count as "no match",
/// refresh failures show up in [`CompositeTrustService::get_status`].
pub struct CompositeTrustService {
    trust_list: Arc<dyn TrustListSource>,
    federation: Arc<dyn FederationSource>,
    trust_list_enabled: AtomicBool,
    federation_enabled: AtomicBool,
}

impl CompositeTrustService {
    /// The trust list starts enabled; federation starts enabled iff it has anchors.
    pub fn new(trust_list: Arc<dyn TrustListSource>, federation: Arc<dyn FederationSource>) -> Self {
        let federation_enabled = federation.has_trust_anchors();
        Self {
            trust_list,
            federation,
            trust_list_enabled: AtomicBool::new(true),
            federation_enabled: AtomicBool::new(federation_enabled),
        }
    }

    /// Wires both registry services over a shared transport.
    pub fn from_config(config: &TrustConfig, transport: Arc<dyn RegistryTransport>) -> Self {
        let trust_list = Arc::new(TrustListService::from_config(
            config.trust_list.clone(),
            transport.clone(),
        ));
        let federation = Arc::new(FederationService::new(config.federation.clone(), transport));
        let service = Self::new(trust_list, federation);
        service.set_enabled(TrustSource::EtsiTrustList, config.trust_list.enabled);
        service
    }

    fn flag(&self, source: TrustSource) -> &AtomicBool {
        match source {
            TrustSource::EtsiTrustList => &self.trust_list_enabled,
            TrustSource::OpenidFederation => &self.federation_enabled,
        }
    }

    pub fn is_enabled(&self, source: TrustSource) -> bool {
        self.flag(source).load(Ordering::SeqCst)
    }

    /// Switch a source on or off for subsequent validations and status reports.
    pub fn set_enabled(&self, source: TrustSource, enabled: bool) {
        let previous = self.flag(source).swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(
                "Trust source {} {}",
                source,
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// Decide whether `issuer` is a trusted credential issuer.
    pub async fn validate_issuer(&self, issuer: Option<&str>) -> TrustDecision {
        let issuer = match issuer.map(str::trim) {
            Some(issuer) if !issuer.is_empty() => issuer,
            _ => {
                debug!("No issuer given; returning untrusted without consulting any source");
                let decision = TrustDecision::untrusted();
                metrics::record_decision("issuer", &decision);
                return decision;
            }
        };

        let mut decision = None;
        if self.is_enabled(TrustSource::EtsiTrustList) {
            if let Some(providers) = self.providers().await {
                decision = match_issuer(&providers, issuer);
            }
        }
        if decision.is_none() {
            decision = self.federation_decision(issuer).await;
        }

        let decision = decision.unwrap_or_else(|| {
            debug!("Issuer {} not found in any enabled trust source", issuer);
            TrustDecision::untrusted()
        });
        metrics::record_decision("issuer", &decision);
        decision
    }

    /// Decide whether the relying party `client_id` is a trusted verifier.
    ///
    /// `certificates` are DER certificates the verifier presented; any one equal
    /// to a listed service certificate also counts as a match.
    pub async fn validate_verifier(
        &self,
        client_id: &str,
        certificates: Option<&[Vec<u8>]>,
    ) -> TrustDecision {
        let client_id = client_id.trim();
        let has_certificates = certificates.map_or(false, |c| !c.is_empty());
        if client_id.is_empty() && !has_certificates {
            let decision = TrustDecision::untrusted();
            metrics::record_decision("verifier", &decision);
            return decision;
        }

        let mut decision = None;
        if self.is_enabled(TrustSource::EtsiTrustList) {
            if let Some(providers) = self.providers().await {
                decision = match_verifier(&providers, client_id, certificates);
            }
        }
        if decision.is_none() && !client_id.is_empty() {
            decision = self.federation_decision(client_id).await;
        }

        let decision = decision.unwrap_or_else(TrustDecision::untrusted);
        metrics::record_decision("verifier", &decision);
        decision
    }

    async fn providers(&self) -> Option<Arc<Vec<trustgate_types::Provider>>> {
        match self.trust_list.providers().await {
            Ok(providers) => Some(providers),
            Err(e) => {
                warn!("Trust list unavailable, treating as no match: {}", e);
                None
            }
        }
    }

    async fn federation_decision(&self, entity_id: &str) -> Option<TrustDecision> {
        if !self.is_enabled(TrustSource::OpenidFederation) || !is_entity_identifier(entity_id) {
            return None;
        }
        let chain = self.federation.resolve_chain(entity_id).await?;
        if !chain.is_valid {
            debug!(
                "No valid trust chain for {}: {}",
                entity_id,
                chain.error.as_deref().unwrap_or("unknown error")
            );
            return None;
        }
        Some(chain_decision(&chain))
    }

    /// Per-source health; overall healthy iff an enabled source is healthy.
    pub async fn get_status(&self) -> AggregateHealth {
        let mut sources = BTreeMap::new();
        for source in TrustSource::ALL {
            let health = if self.is_enabled(source) {
                let mut health = match source {
                    TrustSource::EtsiTrustList => self.trust_list.health().await,
                    TrustSource::OpenidFederation => self.federation.health().await,
                };
                health.enabled = true;
                health
            } else {
                SourceHealth::disabled()
            };
            metrics::update_source_health(source, &health);
            sources.insert(source, health);
        }
        AggregateHealth::from_sources(sources)
    }

    /// Refresh every enabled source concurrently and report the resulting status.
    pub async fn refresh(&self) -> AggregateHealth {
        let trust_list = async {
            if !self.is_enabled(TrustSource::EtsiTrustList) {
                return;
            }
            match self.trust_list.refresh().await {
                Ok(count) => info!("Trust list refreshed with {} providers", count),
                Err(e) => {
                    metrics::record_refresh_failure(TrustSource::EtsiTrustList);
                    tracing::error!("Trust list refresh failed: {}", e);
                }
            }
        };
        let federation = async {
            if !self.is_enabled(TrustSource::OpenidFederation) {
                return;
            }
            let reachable = self.federation.refresh().await;
            if reachable == 0 {
                metrics::record_refresh_failure(TrustSource::OpenidFederation);
                tracing::error!("No configured trust anchor is reachable");
            } else {
                info!("Federation refreshed, {} trust anchors reachable", reachable);
            }
        };
        tokio::join!(trust_list, federation);
        self.get_status().await
    }
}

/// Refreshes `service` every `period` until the returned handle is aborted.
pub fn spawn_refresh_task(service: Arc<CompositeTrustService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let status = service.refresh().await;
            debug!("Periodic trust refresh done, healthy: {}", status.healthy);
        }
    })
}

/// Federation entity identifiers are http(s) URLs.
fn is_entity_identifier(id: &str) -> bool {
    id.starts_with("https://") || id.starts_with("http://")
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
}

fn chain_decision(chain: &TrustChain) -> TrustDecision {
    let leaf = chain.leaf();
    let name = leaf
        .and_then(|s| s.organization_name())
        .unwrap_or(&chain.entity_id)
        .to_string();
    TrustDecision::trusted_by(TrustSource::OpenidFederation)
        .with_provider_name(name)
        .with_validity(timestamp(leaf.and_then(|s| s.issued_at)), timestamp(chain.expires_at()))
        .with_evidence("entity_id", chain.entity_id.clone())
        .with_evidence("trust_anchor", chain.trust_anchor_id.clone())
        .with_evidence("chain_length", chain.len().to_string())
}
