use crate::fetcher::EntityStatementFetcher;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use trustgate_types::{EntityStatement, FederationConfig, FederationError, TrustChain};

pub const NOT_SELF_SIGNED: &str = "first statement is not self-signed";

/// Walks authority hints from a leaf entity towards a configured trust anchor.
///
/// Hops are resolved one at a time, hints in published order, so the first
/// anchor found ends the walk.
pub struct TrustChainBuilder {
    fetcher: Arc<EntityStatementFetcher>,
    config: FederationConfig,
}

impl TrustChainBuilder {
    pub fn new(fetcher: Arc<EntityStatementFetcher>, config: FederationConfig) -> Self {
        Self { fetcher, config }
    }

    /// `None` when no trust anchors are configured. Otherwise always a chain,
    /// invalid with an error message when no anchor was reached.
    pub async fn build_chain(&self, entity_id: &str) -> Option<TrustChain> {
        if !self.config.has_anchors() {
            tracing::debug!("No trust anchors configured; not resolving {}", entity_id);
            return None;
        }

        let chain = match self.walk(entity_id).await {
            Ok(chain) => chain,
            Err(e) => {
                tracing::warn!("Trust chain resolution for {} failed: {}", entity_id, e);
                TrustChain::unresolved(entity_id, Vec::new(), e.to_string())
            }
        };
        if chain.is_valid {
            tracing::info!(
                "Resolved trust chain for {} to anchor {} ({} statements)",
                entity_id,
                chain.trust_anchor_id,
                chain.len()
            );
        } else {
            tracing::debug!(
                "No valid trust chain for {}: {}",
                entity_id,
                chain.error.as_deref().unwrap_or("unknown")
            );
        }
        Some(chain)
    }

    async fn walk(&self, entity_id: &str) -> Result<TrustChain, FederationError> {
        let leaf = self.fetcher.fetch(entity_id).await?;
        let mut statements = vec![EntityStatement::clone(&leaf)];
        if !leaf.is_self_signed() {
            return Ok(TrustChain::unresolved(entity_id, statements, NOT_SELF_SIGNED));
        }

        let max_depth = self.config.max_chain_depth;
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(normalize(&leaf.subject));
        let mut current = leaf;

        for hop in 0..max_depth {
            let hints = current.authority_hints();
            if hints.is_empty() {
                return Ok(TrustChain::unresolved(
                    entity_id,
                    statements,
                    format!(
                        "{} publishes no authority hints; no trust anchor reachable",
                        current.subject
                    ),
                ));
            }

            let mut next: Option<Arc<EntityStatement>> = None;
            for hint in hints {
                if let Some(anchor) = self.config.trust_anchor(hint) {
                    match self.fetcher.fetch_subordinate(hint, &current.subject).await {
                        Ok(statement) => {
                            statements.push(statement);
                            return Ok(self.finish(entity_id, &anchor.entity_id, statements));
                        }
                        Err(e) => {
                            tracing::warn!("Trust anchor {} did not vouch for {}: {}", hint, current.subject, e);
                            continue;
                        }
                    }
                }

                if visited.contains(&normalize(hint)) {
                    tracing::warn!("Ignoring authority hint {} from {}: already on the chain", hint, current.subject);
                    continue;
                }
                match self.resolve_intermediate(hint, &current.subject).await {
                    Ok((subordinate, intermediate)) => {
                        statements.push(subordinate);
                        statements.push(EntityStatement::clone(&intermediate));
                        visited.insert(normalize(hint));
                        next = Some(intermediate);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Skipping authority hint {} of {}: {}", hint, current.subject, e);
                    }
                }
            }

            match next {
                Some(intermediate) => current = intermediate,
                None => tracing::debug!("Hop {} from {} resolved no authority", hop + 1, current.subject),
            }
        }

        let error = if statements.len() >= max_depth {
            format!(
                "maximum chain depth {} exceeded without reaching a trust anchor",
                max_depth
            )
        } else {
            "no trust anchor reachable from authority hints".to_string()
        };
        Ok(TrustChain::unresolved(entity_id, statements, error))
    }

    /// Both statements for an intermediate hop, or neither.
    async fn resolve_intermediate(
        &self,
        intermediate: &str,
        subject: &str,
    ) -> Result<(EntityStatement, Arc<EntityStatement>), FederationError> {
        let subordinate = self.fetcher.fetch_subordinate(intermediate, subject).await?;
        let configuration = self.fetcher.fetch(intermediate).await?;
        Ok((subordinate, configuration))
    }

    /// A chain that reached `anchor`, unless one of its statements has expired.
    fn finish(&self, entity_id: &str, anchor: &str, statements: Vec<EntityStatement>) -> TrustChain {
        let now = Utc::now().timestamp();
        if let Some(expired) = statements.iter().find(|s| s.is_expired(now)) {
            let error = format!(
                "statement issued by {} about {} has expired",
                expired.issuer, expired.subject
            );
            return TrustChain::unresolved(entity_id, statements, error);
        }
        TrustChain::resolved(entity_id, anchor, statements)
    }
}

fn normalize(entity_id: &str) -> String {
    entity_id.trim().trim_end_matches('/').to_string()
}
