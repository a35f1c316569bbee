use crate::chain::TrustChainBuilder;
use crate::fetcher::EntityStatementFetcher;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use trustgate_transport::RegistryTransport;
use trustgate_types::{
    EntityStatement, FederationConfig, SourceHealth, TrustAnchorConfig, TrustChain,
};

#[derive(Debug, Default)]
struct FederationState {
    healthy: bool,
    reachable_anchors: usize,
    last_update: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Refresh and health facade over the statement fetcher and chain builder.
pub struct FederationService {
    config: FederationConfig,
    fetcher: Arc<EntityStatementFetcher>,
    builder: TrustChainBuilder,
    state: RwLock<FederationState>,
}

impl FederationService {
    pub fn new(config: FederationConfig, transport: Arc<dyn RegistryTransport>) -> Self {
        let fetcher = Arc::new(EntityStatementFetcher::new(transport, config.cache_ttl()));
        let builder = TrustChainBuilder::new(Arc::clone(&fetcher), config.clone());
        Self {
            config,
            fetcher,
            builder,
            state: RwLock::new(FederationState::default()),
        }
    }

    pub fn anchors(&self) -> &[TrustAnchorConfig] {
        &self.config.trust_anchors
    }

    pub fn has_trust_anchors(&self) -> bool {
        self.config.has_anchors()
    }

    /// Re-fetches every anchor's configuration, returning how many are
    /// reachable. Healthy iff at least one is.
    pub async fn refresh(&self) -> usize {
        if !self.config.has_anchors() {
            let mut state = self.state.write().await;
            state.healthy = false;
            state.reachable_anchors = 0;
            state.last_error = Some("no trust anchors configured".to_string());
            return 0;
        }

        let mut reachable = 0;
        let mut errors = Vec::new();
        for anchor in &self.config.trust_anchors {
            self.fetcher.invalidate(&anchor.entity_id).await;
            match self.fetcher.fetch(&anchor.entity_id).await {
                Ok(statement) => match check_anchor_keys(anchor, &statement) {
                    Ok(()) => reachable += 1,
                    Err(reason) => {
                        tracing::warn!("Trust anchor {} rejected: {}", anchor.entity_id, reason);
                        errors.push(format!("{}: {}", anchor.entity_id, reason));
                    }
                },
                Err(e) => {
                    tracing::warn!("Trust anchor {} unreachable: {}", anchor.entity_id, e);
                    errors.push(e.to_string());
                }
            }
        }

        tracing::info!(
            "Federation refresh complete: {}/{} trust anchors reachable",
            reachable,
            self.config.trust_anchors.len()
        );
        let mut state = self.state.write().await;
        state.healthy = reachable > 0;
        state.reachable_anchors = reachable;
        state.last_update = Some(Utc::now());
        state.last_error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        reachable
    }

    pub async fn build_trust_chain(&self, entity_id: &str) -> Option<TrustChain> {
        self.builder.build_chain(entity_id).await
    }

    pub async fn is_trusted(&self, entity_id: &str) -> bool {
        self.build_trust_chain(entity_id)
            .await
            .map_or(false, |chain| chain.is_valid)
    }

    pub async fn is_healthy(&self) -> bool {
        self.state.read().await.healthy
    }

    pub async fn health(&self) -> SourceHealth {
        let state = self.state.read().await;
        SourceHealth {
            enabled: self.config.has_anchors(),
            healthy: state.healthy,
            last_update: state.last_update,
            entry_count: state.reachable_anchors,
            error: state.last_error.clone(),
        }
    }

    pub async fn clear_cache(&self) {
        self.fetcher.clear_cache().await;
    }

    pub async fn cached_statements(&self) -> usize {
        self.fetcher.cached_count().await
    }
}

/// Every configured key must be published by the anchor. Keys are compared by
/// `kid` when the configured key has one, otherwise member by member.
fn check_anchor_keys(anchor: &TrustAnchorConfig, statement: &EntityStatement) -> Result<(), String> {
    if !statement.is_self_signed() {
        return Err("configuration statement is not self-signed".to_string());
    }
    let Some(expected) = anchor.jwks.as_ref() else {
        return Ok(());
    };
    let published: &[Map<String, Value>] = statement
        .jwks
        .as_ref()
        .map(|set| set.keys.as_slice())
        .unwrap_or(&[]);

    for key in &expected.keys {
        let found = match key.get("kid") {
            Some(kid) => published.iter().any(|p| p.get("kid") == Some(kid) && same_material(key, p)),
            None => published.iter().any(|p| p == key),
        };
        if !found {
            let kid = key.get("kid").and_then(Value::as_str).unwrap_or("<no kid>");
            return Err(format!("configured key {} is not published", kid));
        }
    }
    Ok(())
}

/// Configured members must match; extra published members are ignored.
fn same_material(expected: &Map<String, Value>, published: &Map<String, Value>) -> bool {
    expected
        .iter()
        .all(|(name, value)| published.get(name) == Some(value))
}
