#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use trustgate_federation::EntityStatementFetcher;
use trustgate_transport::MemoryTransport;
use trustgate_types::{EntityStatement, FederationConfig, TrustAnchorConfig};

pub const LEAF: &str = "https://leaf.example";
pub const INTERMEDIATE: &str = "https://intermediate.example";
pub const ANCHOR: &str = "https://anchor.example";

/// Compact token with an unsigned header; the payload is all that is read.
pub fn token(statement: &EntityStatement) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","typ":"entity-statement+jwt"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(statement).expect("serializable"));
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

pub fn config(anchors: &[&str], max_chain_depth: usize) -> FederationConfig {
    FederationConfig {
        trust_anchors: anchors.iter().map(|a| TrustAnchorConfig::new(*a)).collect(),
        max_chain_depth,
        ..FederationConfig::default()
    }
}

/// An in-memory federation served through `MemoryTransport`.
#[derive(Default)]
pub struct Federation {
    pub transport: MemoryTransport,
}

impl Federation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `id`'s self statement with the given authority hints.
    pub fn entity(&self, id: &str, hints: &[&str]) -> EntityStatement {
        let mut statement = EntityStatement::new(id, id);
        statement.issued_at = Some(1_700_000_000);
        if !hints.is_empty() {
            statement.authority_hints = Some(hints.iter().map(|h| h.to_string()).collect());
        }
        self.publish_configuration(id, &statement);
        statement
    }

    pub fn publish_configuration(&self, id: &str, statement: &EntityStatement) {
        let url = EntityStatementFetcher::configuration_url(id).expect("valid entity id");
        self.transport.insert(url, token(statement));
    }

    /// Publishes the statement `issuer` makes about `subject`.
    pub fn vouch(&self, issuer: &str, subject: &str) -> EntityStatement {
        let mut statement = EntityStatement::new(issuer, subject);
        statement.issued_at = Some(1_700_000_000);
        self.publish_subordinate(&statement);
        statement
    }

    pub fn publish_subordinate(&self, statement: &EntityStatement) {
        let url = EntityStatementFetcher::fetch_url(&statement.issuer, &statement.subject)
            .expect("valid issuer");
        self.transport.insert(url, token(statement));
    }

    pub fn configuration_requests(&self, id: &str) -> usize {
        self.transport
            .request_count(&EntityStatementFetcher::configuration_url(id).expect("valid entity id"))
    }
}
