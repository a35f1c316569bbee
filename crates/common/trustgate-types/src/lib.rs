//! Trustgate types – shared data model for trust-registry lookups.
//!
//! - ETSI trusted-list documents, providers, services and list pointers.
//! - OpenID-Federation entity statements and resolved trust chains.
//! - Cross-source trust decisions and health reporting.
//! - The error taxonomy, TOML configuration and the TTL cache used by every fetcher.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod decision;
pub mod error;
pub mod federation;
pub mod tsl;

pub use cache::{CachedEntry, TtlCache};
pub use config::{
    FederationConfig, ANY_TERRITORY, EU_LOTL_URL, HttpConfig, ParserKind, TrustAnchorConfig, TrustConfig, TrustListConfig,
};
pub use decision::{AggregateHealth, SourceHealth, TrustDecision, TrustSource};
pub use error::{
    ConfigError, FederationError, ParseError, StatementError, TransportError, TrustListError,
};
pub use federation::{EntityStatement, JwkSet, TrustChain};
pub use tsl::{service_type, status, ListPointer, Provider, ServiceEntry, TrustAnchorInfo, TrustedListDocument};
