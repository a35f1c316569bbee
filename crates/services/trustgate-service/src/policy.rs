//! Acceptance rules layered over trust decisions.
//!
//! A credential-verification flow holds a [`TrustPolicy`] built around an
//! injected [`TrustEvaluator`] instead of reaching for a process-wide hook.

use crate::composite::CompositeTrustService;
use async_trait::async_trait;
use std::sync::Arc;
use trustgate_types::TrustDecision;

/// Anything that can produce trust decisions for issuers and verifiers.
#[async_trait]
pub trait TrustEvaluator: Send + Sync {
    async fn evaluate_issuer(&self, issuer: Option<&str>) -> TrustDecision;

    async fn evaluate_verifier(
        &self,
        client_id: &str,
        certificates: Option<&[Vec<u8>]>,
    ) -> TrustDecision;
}

#[async_trait]
impl TrustEvaluator for CompositeTrustService {
    async fn evaluate_issuer(&self, issuer: Option<&str>) -> TrustDecision {
        self.validate_issuer(issuer).await
    }

    async fn evaluate_verifier(
        &self,
        client_id: &str,
        certificates: Option<&[Vec<u8>]>,
    ) -> TrustDecision {
        self.validate_verifier(client_id, certificates).await
    }
}

/// Result of applying a [`TrustPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOutcome {
    Accepted(TrustDecision),
    Rejected {
        reason: String,
        decision: TrustDecision,
    },
}

impl PolicyOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PolicyOutcome::Accepted(_))
    }

    pub fn decision(&self) -> &TrustDecision {
        match self {
            PolicyOutcome::Accepted(decision) => decision,
            PolicyOutcome::Rejected { decision, .. } => decision,
        }
    }
}

pub struct TrustPolicy {
    evaluator: Arc<dyn TrustEvaluator>,
    require_granted: bool,
}

impl TrustPolicy {
    pub fn new(evaluator: Arc<dyn TrustEvaluator>) -> Self {
        Self {
            evaluator,
            require_granted: false,
        }
    }

    /// Also reject trusted-list matches whose service status is not `granted`.
    pub fn requiring_granted_status(mut self) -> Self {
        self.require_granted = true;
        self
    }

    pub async fn check_issuer(&self, issuer: Option<&str>) -> PolicyOutcome {
        let decision = self.evaluator.evaluate_issuer(issuer).await;
        self.apply("issuer", issuer.unwrap_or_default(), decision)
    }

    pub async fn check_verifier(
        &self,
        client_id: &str,
        certificates: Option<&[Vec<u8>]>,
    ) -> PolicyOutcome {
        let decision = self.evaluator.evaluate_verifier(client_id, certificates).await;
        self.apply("verifier", client_id, decision)
    }

    fn apply(&self, kind: &str, identity: &str, decision: TrustDecision) -> PolicyOutcome {
        if !decision.trusted {
            return PolicyOutcome::Rejected {
                reason: format!("{} {:?} is not trusted by any enabled source", kind, identity),
                decision,
            };
        }
        // Only trusted-list decisions carry a service status.
        if self.require_granted && decision.evidence.get("granted").map_or(false, |g| g != "true") {
            let status = decision.status.clone().unwrap_or_default();
            return PolicyOutcome::Rejected {
                reason: format!("{} {:?} matched a service with status {}", kind, identity, status),
                decision,
            };
        }
        tracing::debug!("Accepted {} {:?}", kind, identity);
        PolicyOutcome::Accepted(decision)
    }
}
