use async_trait::async_trait;
use std::sync::Arc;
use trustgate_federation::FederationService;
use trustgate_tsl::TrustListService;
use trustgate_types::{Provider, SourceHealth, TrustChain, TrustListError};

/// The trusted-list side of the composite service.
#[async_trait]
pub trait TrustListSource: Send + Sync {
    /// Aggregated providers, loading them on first use.
    async fn providers(&self) -> Result<Arc<Vec<Provider>>, TrustListError>;

    async fn refresh(&self) -> Result<usize, TrustListError>;

    async fn health(&self) -> SourceHealth;
}

/// The federation side of the composite service.
#[async_trait]
pub trait FederationSource: Send + Sync {
    fn has_trust_anchors(&self) -> bool;

    async fn resolve_chain(&self, entity_id: &str) -> Option<TrustChain>;

    async fn refresh(&self) -> usize;

    async fn health(&self) -> SourceHealth;
}

#[async_trait]
impl TrustListSource for TrustListService {
    async fn providers(&self) -> Result<Arc<Vec<Provider>>, TrustListError> {
        self.get_all_providers().await
    }

    async fn refresh(&self) -> Result<usize, TrustListError> {
        TrustListService::refresh(self).await
    }

    async fn health(&self) -> SourceHealth {
        TrustListService::health(self).await
    }
}

#[async_trait]
impl FederationSource for FederationService {
    fn has_trust_anchors(&self) -> bool {
        FederationService::has_trust_anchors(self)
    }

    async fn resolve_chain(&self, entity_id: &str) -> Option<TrustChain> {
        self.build_trust_chain(entity_id).await
    }

    async fn refresh(&self) -> usize {
        FederationService::refresh(self).await
    }

    async fn health(&self) -> SourceHealth {
        FederationService::health(self).await
    }
}
