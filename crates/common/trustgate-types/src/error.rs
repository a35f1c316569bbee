use thiserror::Error;

/// Failures of the injected registry transport. Always distinct from format
/// errors so callers can tell "unreachable" from "malformed".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("no document registered for {url}")]
    NotFound { url: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl TransportError {
    pub fn url(&self) -> Option<&str> {
        match self {
            TransportError::Request { url, .. }
            | TransportError::Status { url, .. }
            | TransportError::NotFound { url } => Some(url),
            TransportError::ClientBuild(_) => None,
        }
    }
}

/// Errors produced while turning trusted-list bytes into a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("document type declarations are not accepted")]
    DtdForbidden,

    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("unexpected root element <{0}>, expected <TrustServiceStatusList>")]
    UnexpectedRoot(String),

    #[error("document is empty")]
    Empty,
}

/// Errors from fetching a trusted list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustListError {
    #[error("failed to fetch trusted list {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to parse trusted list {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
}

impl TrustListError {
    pub fn is_fetch(&self) -> bool {
        matches!(self, TrustListError::Fetch { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, TrustListError::Parse { .. })
    }
}

/// Errors decoding an entity-statement token.
#[derive(Error, Debug)]
pub enum StatementError {
    #[error("invalid token structure: expected 3 parts separated by '.', found {actual_parts} parts")]
    IncorrectTokenPartsCount { actual_parts: usize },

    #[error("base64 decoding of the token payload failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token payload is not a valid entity statement: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token payload is not valid UTF-8")]
    Encoding,
}

/// Errors from the federation statement fetcher.
#[derive(Error, Debug)]
pub enum FederationError {
    #[error("failed to fetch entity statement {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("malformed entity statement from {url}: {source}")]
    Statement {
        url: String,
        #[source]
        source: StatementError,
    },

    #[error("invalid entity identifier {entity_id:?}: {reason}")]
    InvalidEntityId { entity_id: String, reason: String },
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
