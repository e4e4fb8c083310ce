//! The stream-metadata interface the engine consumes (`spec.md` §6.3).
//!
//! A per-stream `namespace -> (key -> string)` map provided by the host.
//! The core only ever touches one namespace, [`HEADER_REWRITE_FILTER_NAME`].
//! This mirrors pingsix's `ProxyContext` (`src/core/context.rs`), which
//! carries per-request state in a string-keyed side-table alongside the
//! request rather than threading extra parameters through every call.

use std::collections::HashMap;

/// Namespace this filter reads and writes under, matching the Envoy
/// extension name the original C++ filter registered as.
pub const HEADER_REWRITE_FILTER_NAME: &str = "envoy.extensions.filters.http.HeaderRewrite";

/// Host-provided stream metadata store.
pub trait StreamMetadata {
    /// Read `(namespace, key)`; `None` if the namespace or key is absent.
    fn get(&self, namespace: &str, key: &str) -> Option<String>;

    /// Overwrite `(namespace, key)`, creating the namespace if needed.
    fn set(&mut self, namespace: &str, key: &str, value: String);
}

/// Reference in-memory implementation of [`StreamMetadata`].
///
/// Good enough to hand to a plugin that has no richer per-stream state
/// to hang metadata off of, and used throughout this crate's tests in
/// place of a host-provided store.
#[derive(Default, Debug, Clone)]
pub struct DynamicMetadataStore {
    namespaces: HashMap<String, HashMap<String, String>>,
}

impl DynamicMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamMetadata for DynamicMetadataStore {
    fn get(&self, namespace: &str, key: &str) -> Option<String> {
        self.namespaces.get(namespace)?.get(key).cloned()
    }

    fn set(&mut self, namespace: &str, key: &str, value: String) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let mut store = DynamicMetadataStore::new();
        store.set(HEADER_REWRITE_FILTER_NAME, "saved", "value".to_string());
        assert_eq!(
            store.get(HEADER_REWRITE_FILTER_NAME, "saved"),
            Some("value".to_string())
        );
    }

    #[test]
    fn missing_key_is_none() {
        let store = DynamicMetadataStore::new();
        assert_eq!(store.get(HEADER_REWRITE_FILTER_NAME, "missing"), None);
    }

    #[test]
    fn overwrite_replaces_previous_value() {
        let mut store = DynamicMetadataStore::new();
        store.set(HEADER_REWRITE_FILTER_NAME, "k", "first".to_string());
        store.set(HEADER_REWRITE_FILTER_NAME, "k", "second".to_string());
        assert_eq!(store.get(HEADER_REWRITE_FILTER_NAME, "k"), Some("second".to_string()));
    }
}
