//! OpenID Federation: entity-statement retrieval and trust-chain resolution
//! from a leaf entity up to a configured trust anchor.

#![forbid(unsafe_code)]

mod chain;
mod fetcher;
mod service;
pub mod statement;

pub use chain::{TrustChainBuilder, NOT_SELF_SIGNED};
pub use fetcher::{EntityStatementFetcher, WELL_KNOWN_PATH};
pub use service::FederationService;
pub use statement::decode_statement;
