use crate::error::ConfigError;
use crate::federation::JwkSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// European Commission list of trusted lists.
pub const EU_LOTL_URL: &str = "https://ec.europa.eu/tools/lotl/eu-lotl.xml";

/// Territory allow-list entry matching every territory.
pub const ANY_TERRITORY: &str = "*";

/// Top-level configuration, usually loaded from `trustgate.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Optional log filter (e.g., "info", "trustgate_tsl=debug").
    pub log_level: Option<String>,
    pub http: HttpConfig,
    pub trust_list: TrustListConfig,
    pub federation: FederationConfig,
}

impl TrustConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        tracing::info!("Loading trustgate configuration from: {:?}", path_ref);
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trust_list.enabled && self.trust_list.root_list_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "trust_list.root_list_url must be set when the trust list is enabled".into(),
            ));
        }
        if self.federation.max_chain_depth == 0 {
            return Err(ConfigError::Invalid(
                "federation.max_chain_depth must be at least 1".into(),
            ));
        }
        if let Some(anchor) = self
            .federation
            .trust_anchors
            .iter()
            .find(|a| a.entity_id.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "trust anchor with empty entity_id: {:?}",
                anchor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("trustgate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which XML strategy parses trusted lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// Pull parser over the raw bytes.
    #[default]
    Streaming,
    /// Parse into a tree first, then walk it.
    Dom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustListConfig {
    pub enabled: bool,
    pub root_list_url: String,
    pub cache_ttl_hours: u64,
    /// Territory codes to follow from the root list; `"*"` follows every pointer.
    pub territories: Vec<String>,
    pub validate_signatures: bool,
    pub parser: ParserKind,
}

impl Default for TrustListConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root_list_url: EU_LOTL_URL.to_string(),
            cache_ttl_hours: 24,
            territories: vec![ANY_TERRITORY.to_string()],
            validate_signatures: true,
            parser: ParserKind::default(),
        }
    }
}

impl TrustListConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600))
    }

    /// Pointers without a declared territory are always followed.
    pub fn allows_territory(&self, territory: Option<&str>) -> bool {
        match territory {
            None => true,
            Some(t) => self
                .territories
                .iter()
                .any(|allowed| allowed == ANY_TERRITORY || allowed.eq_ignore_ascii_case(t)),
        }
    }
}

/// An entity accepted as the terminus of a federation trust chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAnchorConfig {
    pub entity_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,
}

impl TrustAnchorConfig {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            jwks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    pub trust_anchors: Vec<TrustAnchorConfig>,
    pub max_chain_depth: usize,
    pub cache_ttl_seconds: u64,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            trust_anchors: Vec::new(),
            max_chain_depth: 5,
            cache_ttl_seconds: 3600,
        }
    }
}

impl FederationConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn has_anchors(&self) -> bool {
        !self.trust_anchors.is_empty()
    }

    /// The configured anchor named by `entity_id`. Anchor ids compare equal
    /// regardless of a trailing slash.
    pub fn trust_anchor(&self, entity_id: &str) -> Option<&TrustAnchorConfig> {
        let wanted = entity_id.trim_end_matches('/');
        self.trust_anchors
            .iter()
            .find(|a| a.entity_id.trim_end_matches('/') == wanted)
    }

    pub fn is_trust_anchor(&self, entity_id: &str) -> bool {
        self.trust_anchor(entity_id).is_some()
    }
}
