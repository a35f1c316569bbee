//! Registry transport: the one outbound capability the trust core needs.
//!
//! Fetchers only ever issue `GET` requests and read the body as bytes, so the
//! seam is a single async method. `HttpTransport` is the production client;
//! `MemoryTransport` serves canned documents in tests and offline tooling.

#![forbid(unsafe_code)]

mod http;
mod memory;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

use trustgate_types::TransportError;

/// Fetches a registry document by URL.
#[async_trait::async_trait]
pub trait RegistryTransport: Send + Sync {
    /// `GET url`, returning the response body. Non-2xx responses are errors.
    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}
