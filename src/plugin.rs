//! The filter runtime: wires [`Program`] into a Pingora-hosted plugin.
//!
//! Grounded on `proxy_rewrite.rs`/`response_rewrite.rs`'s `create_*_plugin`
//! factory shape and on the `ProxyPlugin` trait those plugins implement:
//! a thin, mostly-default-method trait with `name`/`priority` plus the two
//! filter hooks this engine actually needs. The `rules` YAML field is
//! validated and parsed once, at construction time; per spec.md §4.7 a
//! malformed DSL body does not fail construction, it just yields a
//! `Program` with `.error` set, which makes the plugin a documented
//! pass-through rather than refusing to load.

use std::sync::Arc;

use async_trait::async_trait;
use pingora_error::{ErrorType::ReadError, OrErr, Result};
use pingora_http::{RequestHeader, ResponseHeader};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use validator::Validate;

use crate::metadata::DynamicMetadataStore;
use crate::program::Program;

pub const PLUGIN_NAME: &str = "header-rewrite";

/// Per-stream state this plugin needs carried between its request and
/// response hooks: the dynamic metadata store `set-metadata` writes and
/// `metadata()` reads back, mirroring how `core::context::ProxyContext`
/// carries custom per-request state alongside a session.
#[derive(Default)]
pub struct ProxyContext {
    pub metadata: DynamicMetadataStore,
}

/// Minimal plugin trait this filter implements. A full gateway integration
/// would share a richer trait across many plugin kinds (see
/// `proxy::plugin::ProxyPlugin`'s request/response-body hooks); this crate
/// only needs the two header-mutation phases, so only those are declared.
#[async_trait]
pub trait ProxyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;

    async fn upstream_request_filter(
        &self,
        _upstream_request: &mut RequestHeader,
        _ctx: &mut ProxyContext,
    ) -> Result<()> {
        Ok(())
    }

    async fn response_filter(&self, _upstream_response: &mut ResponseHeader, _ctx: &mut ProxyContext) -> Result<()> {
        Ok(())
    }
}

const PRIORITY: i32 = 1008;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PluginConfig {
    #[validate(length(min = 1))]
    pub rules: String,
}

pub fn create_header_rewrite_plugin(cfg: YamlValue) -> Result<Arc<dyn ProxyPlugin>> {
    let config: PluginConfig = serde_yaml::from_value(cfg).or_err(ReadError, "invalid header-rewrite plugin config")?;
    config
        .validate()
        .or_err(ReadError, "invalid header-rewrite plugin config")?;

    let program = Program::parse(&config.rules);
    Ok(Arc::new(PluginHeaderRewrite { program }))
}

pub struct PluginHeaderRewrite {
    program: Program,
}

#[async_trait]
impl ProxyPlugin for PluginHeaderRewrite {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn upstream_request_filter(&self, upstream_request: &mut RequestHeader, ctx: &mut ProxyContext) -> Result<()> {
        self.program.run_request(upstream_request, &mut ctx.metadata);
        Ok(())
    }

    async fn response_filter(&self, upstream_response: &mut ResponseHeader, ctx: &mut ProxyContext) -> Result<()> {
        self.program.run_response(upstream_response, &mut ctx.metadata);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn yaml_config(rules: &str) -> Value {
        serde_yaml::from_str(&format!("rules: |\n  {}", rules.replace('\n', "\n  "))).unwrap()
    }

    #[test]
    fn valid_rules_produce_a_working_plugin() {
        let plugin = create_header_rewrite_plugin(yaml_config("http-request set-header x-foo bar")).unwrap();
        assert_eq!(plugin.name(), PLUGIN_NAME);

        let mut headers = RequestHeader::build("GET", b"/", None).unwrap();
        let mut ctx = ProxyContext::default();
        futures::executor::block_on(plugin.upstream_request_filter(&mut headers, &mut ctx)).unwrap();
        assert_eq!(headers.headers.get("x-foo").unwrap(), "bar");
    }

    #[test]
    fn malformed_rules_do_not_fail_construction() {
        let plugin = create_header_rewrite_plugin(yaml_config("http-request set-header only-one-arg")).unwrap();

        let mut headers = RequestHeader::build("GET", b"/", None).unwrap();
        let original = headers.headers.clone();
        let mut ctx = ProxyContext::default();
        futures::executor::block_on(plugin.upstream_request_filter(&mut headers, &mut ctx)).unwrap();
        assert_eq!(headers.headers, original);
    }

    #[test]
    fn empty_rules_fail_validation() {
        let err = create_header_rewrite_plugin(yaml_config("")).unwrap_err();
        assert!(err.to_string().contains("invalid header-rewrite plugin config"));
    }
}
