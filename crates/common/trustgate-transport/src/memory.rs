use crate::RegistryTransport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use trustgate_types::TransportError;

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<String, Vec<u8>>,
    failures: HashMap<String, u16>,
    requests: HashMap<String, usize>,
}

/// In-memory transport serving registered documents by exact URL.
///
/// Every request is counted, including failed ones, so tests can assert how
/// often a cache went to the network.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the recorded state from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serve `body` for `url`, clearing any failure registered for it.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        let url = url.into();
        let mut state = self.lock();
        state.failures.remove(&url);
        state.documents.insert(url, body.into());
    }

    /// Answer `url` with the given HTTP status instead of a body.
    pub fn fail_with_status(&self, url: impl Into<String>, status: u16) {
        let url = url.into();
        let mut state = self.lock();
        state.documents.remove(&url);
        state.failures.insert(url, status);
    }

    pub fn remove(&self, url: &str) {
        let mut state = self.lock();
        state.documents.remove(url);
        state.failures.remove(url);
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.lock().requests.get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.lock().requests.values().sum()
    }
}

#[async_trait::async_trait]
impl RegistryTransport for MemoryTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let mut state = self.lock();
        *state.requests.entry(url.to_string()).or_insert(0) += 1;

        if let Some(status) = state.failures.get(url) {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        state
            .documents
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::NotFound {
                url: url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn serves_counts_and_fails() {
        let transport = MemoryTransport::new();
        transport.insert("https://a.example/list.xml", b"<x/>".to_vec());

        assert_eq!(transport.get("https://a.example/list.xml").await.unwrap(), b"<x/>");
        assert_matches!(
            transport.get("https://b.example").await,
            Err(TransportError::NotFound { .. })
        );

        transport.fail_with_status("https://a.example/list.xml", 503);
        assert_matches!(
            transport.get("https://a.example/list.xml").await,
            Err(TransportError::Status { status: 503, .. })
        );

        assert_eq!(transport.request_count("https://a.example/list.xml"), 2);
        assert_eq!(transport.total_requests(), 3);
    }
}
