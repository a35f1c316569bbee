use crate::statement::decode_statement_bytes;
use std::sync::Arc;
use std::time::Duration;
use trustgate_transport::RegistryTransport;
use trustgate_types::{EntityStatement, FederationError, TtlCache};
use url::Url;

/// Path of an entity's self-published configuration statement.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-federation";

/// Retrieves entity statements. Self statements are cached per entity id;
/// subordinate statements are always fetched fresh.
pub struct EntityStatementFetcher {
    transport: Arc<dyn RegistryTransport>,
    cache: TtlCache<String, Arc<EntityStatement>>,
}

impl EntityStatementFetcher {
    pub fn new(transport: Arc<dyn RegistryTransport>, cache_ttl: Duration) -> Self {
        Self {
            transport,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// `{entity_id}/.well-known/openid-federation`
    pub fn configuration_url(entity_id: &str) -> Result<String, FederationError> {
        let base = entity_base(entity_id)?;
        Ok(format!("{}{}", base, WELL_KNOWN_PATH))
    }

    /// `{issuer}/fetch?sub={subject}` with the subject query-encoded.
    pub fn fetch_url(issuer: &str, subject: &str) -> Result<String, FederationError> {
        let base = entity_base(issuer)?;
        let mut url = Url::parse(&format!("{}/fetch", base)).map_err(|e| {
            FederationError::InvalidEntityId {
                entity_id: issuer.to_string(),
                reason: e.to_string(),
            }
        })?;
        url.query_pairs_mut().append_pair("sub", subject);
        Ok(url.into())
    }

    /// The entity's self statement.
    pub async fn fetch(&self, entity_id: &str) -> Result<Arc<EntityStatement>, FederationError> {
        let key = cache_key(entity_id);
        if let Some(statement) = self.cache.get(key).await {
            tracing::debug!("Entity statement cache hit for {}", entity_id);
            return Ok(statement);
        }

        let url = Self::configuration_url(entity_id)?;
        let statement = Arc::new(self.get_statement(&url).await?);
        self.cache.insert(key.to_string(), Arc::clone(&statement)).await;
        Ok(statement)
    }

    /// The statement `issuer` publishes about `subject`.
    pub async fn fetch_subordinate(
        &self,
        issuer: &str,
        subject: &str,
    ) -> Result<EntityStatement, FederationError> {
        let url = Self::fetch_url(issuer, subject)?;
        self.get_statement(&url).await
    }

    async fn get_statement(&self, url: &str) -> Result<EntityStatement, FederationError> {
        tracing::debug!("Fetching entity statement from {}", url);
        let body = self
            .transport
            .get(url)
            .await
            .map_err(|source| FederationError::Fetch {
                url: url.to_string(),
                source,
            })?;
        decode_statement_bytes(&body).map_err(|source| FederationError::Statement {
            url: url.to_string(),
            source,
        })
    }

    pub async fn invalidate(&self, entity_id: &str) -> bool {
        self.cache.invalidate(cache_key(entity_id)).await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.len().await
    }
}

fn cache_key(entity_id: &str) -> &str {
    entity_id.trim().trim_end_matches('/')
}

/// Entity ids are absolute http(s) URLs without query or fragment.
fn entity_base(entity_id: &str) -> Result<&str, FederationError> {
    let invalid = |reason: &str| FederationError::InvalidEntityId {
        entity_id: entity_id.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = cache_key(entity_id);
    let parsed = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "https" | "http") {
        return Err(invalid("scheme must be https or http"));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn builds_well_known_and_fetch_urls() {
        assert_eq!(
            EntityStatementFetcher::configuration_url("https://leaf.example/").unwrap(),
            "https://leaf.example/.well-known/openid-federation"
        );
        assert_eq!(
            EntityStatementFetcher::configuration_url("https://op.example/tenant").unwrap(),
            "https://op.example/tenant/.well-known/openid-federation"
        );
        assert_eq!(
            EntityStatementFetcher::fetch_url("https://anchor.example", "https://leaf.example")
                .unwrap(),
            "https://anchor.example/fetch?sub=https%3A%2F%2Fleaf.example"
        );
    }

    #[test]
    fn rejects_non_url_entity_ids() {
        assert_matches!(
            EntityStatementFetcher::configuration_url("did:web:leaf.example"),
            Err(FederationError::InvalidEntityId { .. })
        );
        assert_matches!(
            EntityStatementFetcher::configuration_url("https://leaf.example?x=1"),
            Err(FederationError::InvalidEntityId { .. })
        );
        assert_matches!(
            EntityStatementFetcher::configuration_url("not a url"),
            Err(FederationError::InvalidEntityId { .. })
        );
    }
}
