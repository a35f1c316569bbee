//! ETSI TS 119 612 trusted lists: parsing, signature validation, caching and
//! aggregation of the EU list of trusted lists into one provider set.

#![forbid(unsafe_code)]

pub mod c14n;
pub mod certificate;
pub mod dsig;
mod fetcher;
pub mod parser;
mod service;

pub use dsig::{DsigError, SignatureValidator, UncheckedSignatureValidator, VerifiedSignature, XmlDsigValidator};
pub use fetcher::TrustListFetcher;
pub use parser::{parser_for, DomParser, StreamingParser, TrustListParser};
pub use service::TrustListService;
