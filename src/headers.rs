//! The header-map interface the engine consumes (`spec.md` §6.2).
//!
//! The core never depends on a concrete header type; it only needs the
//! five operations below. Implementing [`HeaderMap`] (and, for the
//! request side, [`RequestHeaderMap`]) for a host's real header type is
//! the only integration work required to plug the engine into a proxy.
//! The adapters at the bottom of this file do that for
//! `pingora_http::RequestHeader` / `ResponseHeader`, the types pingsix's
//! own plugins (`proxy_rewrite`, `response_rewrite`) mutate directly.

use pingora_http::{RequestHeader, ResponseHeader};

use crate::error::RuleError;

/// Operations common to both the request and response header map.
///
/// Header-name comparison is case-insensitive on the host side; the core
/// always passes lower-cased names, matching the convention pingsix's
/// plugins rely on (`http::header::HOST`, `"x-foo"`, ...).
pub trait HeaderMap {
    /// All occurrences of `name` joined by `,`; `None` if absent.
    fn get_all_as_comma_string(&self, name: &str) -> Option<String>;

    /// Replace all values of `name` with a single `value`.
    fn set(&mut self, name: &str, value: &str) -> Result<(), RuleError>;

    /// Add another value under `name`, preserving existing ones.
    fn append(&mut self, name: &str, value: &str) -> Result<(), RuleError>;
}

/// Request-only operations: the `:path` pseudo-header.
pub trait RequestHeaderMap: HeaderMap {
    /// `:path` including the query string.
    fn get_path(&self) -> String;

    /// Replace `:path`, query string included.
    fn set_path(&mut self, path: &str) -> Result<(), RuleError>;
}

fn host_rejected(reason: impl std::fmt::Display) -> RuleError {
    RuleError::HostRejected {
        reason: reason.to_string(),
    }
}

impl HeaderMap for RequestHeader {
    fn get_all_as_comma_string(&self, name: &str) -> Option<String> {
        get_all_as_comma_string(&self.headers, name)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), RuleError> {
        self.insert_header(name.to_string(), value)
            .map_err(host_rejected)
    }

    fn append(&mut self, name: &str, value: &str) -> Result<(), RuleError> {
        self.append_header(name.to_string(), value)
            .map_err(host_rejected)
    }
}

impl RequestHeaderMap for RequestHeader {
    fn get_path(&self) -> String {
        self.uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| self.uri.path().to_string())
    }

    fn set_path(&mut self, path: &str) -> Result<(), RuleError> {
        let uri: http::Uri = path.parse().map_err(host_rejected)?;
        self.set_uri(uri);
        Ok(())
    }
}

impl HeaderMap for ResponseHeader {
    fn get_all_as_comma_string(&self, name: &str) -> Option<String> {
        get_all_as_comma_string(&self.headers, name)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), RuleError> {
        self.insert_header(name.to_string(), value)
            .map_err(host_rejected)
    }

    fn append(&mut self, name: &str, value: &str) -> Result<(), RuleError> {
        self.append_header(name.to_string(), value)
            .map_err(host_rejected)
    }
}

fn get_all_as_comma_string(headers: &http::HeaderMap, name: &str) -> Option<String> {
    let mut values = headers.get_all(name).iter().peekable();
    values.peek()?;
    let joined = values
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");
    Some(joined)
}
