//! Trust decisions for credential exchange counter-parties.
//!
//! [`CompositeTrustService`] reconciles the ETSI trusted-list source and the
//! OpenID-Federation source behind one interface: validate an issuer, validate
//! a verifier, report health, and switch sources on or off at runtime.
//! [`TrustPolicy`] layers acceptance rules on top of any [`TrustEvaluator`].

#![forbid(unsafe_code)]

mod composite;
mod matching;
pub mod metrics;
mod policy;
mod source;

pub use composite::{spawn_refresh_task, CompositeTrustService};
pub use policy::{PolicyOutcome, TrustEvaluator, TrustPolicy};
pub use source::{FederationSource, TrustListSource};
