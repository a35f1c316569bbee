use crate::dsig::{SignatureValidator, XmlDsigValidator};
use crate::parser::{parser_for, TrustListParser};
use std::sync::Arc;
use std::time::Duration;
use trustgate_transport::RegistryTransport;
use trustgate_types::{ParseError, TrustListConfig, TrustListError, TrustedListDocument, TtlCache};

/// Fetches, verifies and parses trusted lists, memoizing parsed documents by
/// URL for the configured TTL.
pub struct TrustListFetcher {
    transport: Arc<dyn RegistryTransport>,
    parser: Arc<dyn TrustListParser>,
    validator: Option<Arc<dyn SignatureValidator>>,
    cache: TtlCache<String, Arc<TrustedListDocument>>,
}

impl TrustListFetcher {
    pub fn new(
        transport: Arc<dyn RegistryTransport>,
        parser: Arc<dyn TrustListParser>,
        validator: Option<Arc<dyn SignatureValidator>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            transport,
            parser,
            validator,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Parser from `config.parser`; XML-DSig validation when enabled.
    pub fn from_config(config: &TrustListConfig, transport: Arc<dyn RegistryTransport>) -> Self {
        let validator: Option<Arc<dyn SignatureValidator>> = if config.validate_signatures {
            Some(Arc::new(XmlDsigValidator::new()))
        } else {
            None
        };
        Self::new(transport, parser_for(config.parser), validator, config.cache_ttl())
    }

    pub async fn fetch(&self, url: &str) -> Result<Arc<TrustedListDocument>, TrustListError> {
        if let Some(doc) = self.cache.get(url).await {
            tracing::debug!("Trusted-list cache hit for {}", url);
            return Ok(doc);
        }
        tracing::debug!("Trusted-list cache miss for {}", url);

        let bytes = self
            .transport
            .get(url)
            .await
            .map_err(|source| TrustListError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let parser = Arc::clone(&self.parser);
        let validator = self.validator.clone();
        let owned_url = url.to_string();
        let parsed = tokio::task::spawn_blocking(move || {
            if let Some(validator) = validator {
                if !validator.validate(&bytes) {
                    tracing::warn!(
                        "Signature of trusted list {} did not verify ({} validator); continuing with reduced trust",
                        owned_url,
                        validator.name()
                    );
                }
            }
            parser.parse(&bytes)
        })
        .await
        .map_err(|e| ParseError::Xml(format!("parser task failed: {}", e)))
        .and_then(|result| result)
        .map_err(|source| TrustListError::Parse {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!(
            "Parsed trusted list {} ({} providers, {} pointers)",
            url,
            parsed.providers.len(),
            parsed.pointers.len()
        );
        let doc = Arc::new(parsed);
        self.cache.insert(url.to_string(), Arc::clone(&doc)).await;
        Ok(doc)
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.len().await
    }

    pub fn parser_name(&self) -> &'static str {
        self.parser.name()
    }
}
