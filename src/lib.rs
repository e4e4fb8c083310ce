//! A small, host-agnostic engine for rewriting HTTP headers, the request
//! path, and per-stream metadata from a line-oriented DSL.
//!
//! The engine itself never touches sockets, upstream selection, or
//! request/response bodies; it consumes a [`headers::HeaderMap`] /
//! [`headers::RequestHeaderMap`] and a [`metadata::StreamMetadata`], both
//! implemented here for `pingora_http`'s types, and hands back mutations
//! through [`program::Program::run_request`] / `run_response`.
//! [`plugin::PluginHeaderRewrite`] wires that into a Pingora-style plugin.

pub mod condition;
pub mod error;
pub mod headers;
pub mod lexer;
pub mod metadata;
pub mod plugin;
pub mod predicate;
pub mod program;
pub mod rule;
pub mod value;

pub use error::{ConfigError, RuleError};
pub use headers::{HeaderMap, RequestHeaderMap};
pub use metadata::{DynamicMetadataStore, StreamMetadata, HEADER_REWRITE_FILTER_NAME};
pub use plugin::{create_header_rewrite_plugin, PluginHeaderRewrite, ProxyContext, ProxyPlugin, PLUGIN_NAME};
pub use program::{Direction, Program};
pub use rule::{Effect, Rule};
