use crate::fetcher::TrustListFetcher;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use trustgate_transport::RegistryTransport;
use trustgate_types::{
    ListPointer, Provider, SourceHealth, TrustListConfig, TrustListError, TrustedListDocument,
};

/// Territory lists fetched in parallel during a refresh.
const TERRITORY_FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Default)]
struct ServiceState {
    providers: Option<Arc<Vec<Provider>>>,
    healthy: bool,
    last_update: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Aggregates providers from the root list and the territory lists it points to.
pub struct TrustListService {
    config: TrustListConfig,
    fetcher: TrustListFetcher,
    state: RwLock<ServiceState>,
}

impl TrustListService {
    pub fn new(config: TrustListConfig, fetcher: TrustListFetcher) -> Self {
        Self {
            config,
            fetcher,
            state: RwLock::new(ServiceState::default()),
        }
    }

    pub fn from_config(config: TrustListConfig, transport: Arc<dyn RegistryTransport>) -> Self {
        let fetcher = TrustListFetcher::from_config(&config, transport);
        Self::new(config, fetcher)
    }

    pub fn config(&self) -> &TrustListConfig {
        &self.config
    }

    pub async fn fetch_root(&self) -> Result<Arc<TrustedListDocument>, TrustListError> {
        self.fetcher.fetch(&self.config.root_list_url).await
    }

    pub async fn fetch_subordinate(&self, url: &str) -> Result<Arc<TrustedListDocument>, TrustListError> {
        self.fetcher.fetch(url).await
    }

    /// Rebuilds the provider aggregate and returns its size.
    ///
    /// Territory failures are skipped. If the root list cannot be obtained the
    /// source is marked unhealthy and the previous aggregate is kept.
    pub async fn refresh(&self) -> Result<usize, TrustListError> {
        match self.collect_providers().await {
            Ok(providers) => {
                let count = providers.len();
                let mut state = self.state.write().await;
                state.providers = Some(Arc::new(providers));
                state.healthy = true;
                state.last_update = Some(Utc::now());
                state.last_error = None;
                tracing::info!("Trusted-list refresh complete: {} providers", count);
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Trusted-list refresh failed: {}", e);
                let mut state = self.state.write().await;
                state.healthy = false;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn collect_providers(&self) -> Result<Vec<Provider>, TrustListError> {
        let root_url = self.config.root_list_url.as_str();
        let root = self.fetch_root().await?;

        let mut providers: Vec<Provider> = root
            .providers
            .iter()
            .cloned()
            .map(|p| match root.territory.as_deref() {
                Some(territory) => p.with_territory(territory),
                None => p,
            })
            .collect();

        let pointers = self.selected_pointers(root_url, &root.pointers);
        tracing::debug!(
            "Following {} of {} trusted-list pointers",
            pointers.len(),
            root.pointers.len()
        );

        let results: Vec<_> = stream::iter(pointers)
            .map(|pointer| async move {
                let result = self.fetch_subordinate(&pointer.location).await;
                (pointer, result)
            })
            .buffered(TERRITORY_FETCH_CONCURRENCY)
            .collect()
            .await;

        for (pointer, result) in results {
            match result {
                Ok(doc) => {
                    let territory = pointer.territory.clone().or_else(|| doc.territory.clone());
                    providers.extend(doc.providers.iter().cloned().map(|p| match &territory {
                        Some(t) => p.with_territory(t.clone()),
                        None => p,
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping territory {} ({}): {}",
                        pointer.territory.as_deref().unwrap_or("?"),
                        pointer.location,
                        e
                    );
                }
            }
        }
        Ok(providers)
    }

    /// XML pointers in the territory allow-list, each location once.
    fn selected_pointers(&self, root_url: &str, pointers: &[ListPointer]) -> Vec<ListPointer> {
        let mut seen = HashSet::new();
        pointers
            .iter()
            .filter(|p| {
                if !p.is_xml() {
                    tracing::debug!("Ignoring non-XML pointer {}", p.location);
                    return false;
                }
                self.config.allows_territory(p.territory.as_deref())
                    && p.location != root_url
                    && seen.insert(p.location.clone())
            })
            .cloned()
            .collect()
    }

    /// Cached aggregate, refreshing first if nothing has been loaded yet.
    pub async fn get_all_providers(&self) -> Result<Arc<Vec<Provider>>, TrustListError> {
        if let Some(providers) = self.state.read().await.providers.clone() {
            return Ok(providers);
        }
        self.refresh().await?;
        Ok(self.state.read().await.providers.clone().unwrap_or_default())
    }

    pub async fn is_healthy(&self) -> bool {
        self.state.read().await.healthy
    }

    pub async fn health(&self) -> SourceHealth {
        let state = self.state.read().await;
        SourceHealth {
            enabled: self.config.enabled,
            healthy: state.healthy,
            last_update: state.last_update,
            entry_count: state.providers.as_ref().map_or(0, |p| p.len()),
            error: state.last_error.clone(),
        }
    }

    /// Drops cached documents; the published aggregate stays until the next refresh.
    pub async fn clear_cache(&self) {
        self.fetcher.clear_cache().await;
    }

    pub async fn cached_documents(&self) -> usize {
        self.fetcher.cached_count().await
    }
}
