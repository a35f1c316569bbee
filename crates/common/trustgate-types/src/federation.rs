use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON Web Key Set as carried in entity statements and anchor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Map<String, Value>>,
}

/// Decoded payload of an OpenID-Federation entity statement.
///
/// The token signature is not verified when a statement is decoded; chain
/// validity rests on the authority-hint graph reaching a configured anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStatement {
    #[serde(rename = "iss")]
    pub issuer: String,

    #[serde(rename = "sub")]
    pub subject: String,

    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,

    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_hints: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_policy: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_marks: Option<Vec<Value>>,
}

impl EntityStatement {
    /// A bare statement with only issuer and subject set.
    pub fn new(issuer: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            issued_at: None,
            expires_at: None,
            jwks: None,
            authority_hints: None,
            metadata: None,
            metadata_policy: None,
            constraints: None,
            trust_marks: None,
        }
    }

    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.subject
    }

    /// Expired iff `exp` is present and strictly before `at` (epoch seconds).
    pub fn is_expired(&self, at: i64) -> bool {
        self.expires_at.map_or(false, |exp| exp < at)
    }

    pub fn authority_hints(&self) -> &[String] {
        self.authority_hints.as_deref().unwrap_or(&[])
    }

    pub fn federation_entity_metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("federation_entity"))
            .and_then(Value::as_object)
    }

    /// `metadata.federation_entity.organization_name`, when published.
    pub fn organization_name(&self) -> Option<&str> {
        self.federation_entity_metadata()
            .and_then(|m| m.get("organization_name"))
            .and_then(Value::as_str)
    }
}

/// Result of walking authority hints from a leaf entity towards a trust anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustChain {
    pub entity_id: String,

    /// Anchor the walk terminated at; empty when none was reached.
    pub trust_anchor_id: String,

    /// Statements in walk order, leaf self statement first.
    pub statements: Vec<EntityStatement>,

    pub is_valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrustChain {
    /// A chain that reached `trust_anchor_id`.
    pub fn resolved(
        entity_id: impl Into<String>,
        trust_anchor_id: impl Into<String>,
        statements: Vec<EntityStatement>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            trust_anchor_id: trust_anchor_id.into(),
            statements,
            is_valid: true,
            error: None,
        }
    }

    /// A chain that did not reach an anchor.
    pub fn unresolved(
        entity_id: impl Into<String>,
        statements: Vec<EntityStatement>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            trust_anchor_id: String::new(),
            statements,
            is_valid: false,
            error: Some(error.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn leaf(&self) -> Option<&EntityStatement> {
        self.statements.first()
    }

    /// Earliest `exp` across the chain, i.e. when the chain stops being usable.
    pub fn expires_at(&self) -> Option<i64> {
        self.statements.iter().filter_map(|s| s.expires_at).min()
    }
}
