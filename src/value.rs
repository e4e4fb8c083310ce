//! Dynamic value parsing and evaluation (`spec.md` §3, §4.2).
//!
//! A dynamic value token is either a static literal or a `%[fn(arg,...)]`
//! form. Parsing happens once, at program build time; evaluation happens
//! on every request/response and always produces an owned `String` (the
//! host may reallocate headers when they are mutated, so the core never
//! hands back a borrow into them).

use crate::error::{ConfigError, RuleError};
use crate::headers::HeaderMap;
use crate::metadata::{StreamMetadata, HEADER_REWRITE_FILTER_NAME};

const DYNAMIC_PREFIX: &str = "%[";
const DYNAMIC_SUFFIX: char = ']';

/// A lazily-evaluated producer of a string from `(headers, stream_metadata)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicValue {
    /// Returns `s` verbatim.
    Static(String),
    /// The `position`-th comma-separated value of header `name`.
    Hdr { name: String, position: i64 },
    /// The value of request query parameter `param`. Request-only.
    Urlp { param: String },
    /// The string stored under `(HEADER_REWRITE_FILTER_NAME, key)`.
    Metadata { key: String },
}

/// Everything a [`DynamicValue`] needs to evaluate itself, without tying
/// the engine to a concrete header or metadata type.
pub struct EvalContext<'a, H: HeaderMap> {
    pub headers: &'a H,
    /// `Some(path)` on the request side, `None` on the response side.
    pub path: Option<&'a str>,
    /// `None` models a host that has no metadata store attached at all.
    pub metadata: Option<&'a dyn StreamMetadata>,
}

impl DynamicValue {
    /// Parse a single token. `is_request` gates `urlp`, which is only
    /// constructible on the request side (`spec.md` invariant 3).
    pub fn parse(token: &str, is_request: bool, line: usize) -> Result<DynamicValue, ConfigError> {
        let Some(rest) = token.strip_prefix(DYNAMIC_PREFIX) else {
            return Ok(DynamicValue::Static(token.to_string()));
        };
        // Seen the opening `%[`: from here on a shape mismatch is a parse
        // error, never a silent fall-back to a static literal.
        let Some(inner) = rest.strip_suffix(DYNAMIC_SUFFIX) else {
            return Err(ConfigError::MalformedDynamicFunction {
                line,
                token: token.to_string(),
            });
        };

        let Some(open_paren) = inner.find('(') else {
            return Err(ConfigError::MalformedDynamicFunction {
                line,
                token: token.to_string(),
            });
        };
        if !inner.ends_with(')') || open_paren + 1 > inner.len() - 1 {
            return Err(ConfigError::MalformedDynamicFunction {
                line,
                token: token.to_string(),
            });
        }

        let name = &inner[..open_paren];
        let args_str = &inner[open_paren + 1..inner.len() - 1];
        let args: Vec<&str> = args_str
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();

        match name {
            "hdr" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(ConfigError::BadFunctionArity {
                        line,
                        name: name.to_string(),
                    });
                }
                let position = match args.get(1) {
                    Some(raw) => raw.parse::<i64>().map_err(|_| ConfigError::MalformedDynamicFunction {
                        line,
                        token: token.to_string(),
                    })?,
                    None => -1,
                };
                Ok(DynamicValue::Hdr {
                    name: args[0].to_string(),
                    position,
                })
            }
            "urlp" => {
                if args.len() != 1 {
                    return Err(ConfigError::BadFunctionArity {
                        line,
                        name: name.to_string(),
                    });
                }
                if !is_request {
                    return Err(ConfigError::UrlpOnResponse { line });
                }
                Ok(DynamicValue::Urlp {
                    param: args[0].to_string(),
                })
            }
            "metadata" => {
                if args.len() != 1 {
                    return Err(ConfigError::BadFunctionArity {
                        line,
                        name: name.to_string(),
                    });
                }
                Ok(DynamicValue::Metadata {
                    key: args[0].to_string(),
                })
            }
            other => Err(ConfigError::UnknownDynamicFunction {
                line,
                name: other.to_string(),
            }),
        }
    }

    /// Evaluate against the given context, producing an owned string.
    pub fn eval<H: HeaderMap>(&self, ctx: &EvalContext<'_, H>) -> Result<String, RuleError> {
        match self {
            DynamicValue::Static(s) => Ok(s.clone()),
            DynamicValue::Hdr { name, position } => eval_hdr(ctx.headers, name, *position),
            DynamicValue::Urlp { param } => eval_urlp(ctx.path, param),
            DynamicValue::Metadata { key } => eval_metadata(ctx.metadata, key),
        }
    }
}

fn eval_hdr<H: HeaderMap>(headers: &H, name: &str, position: i64) -> Result<String, RuleError> {
    let Some(joined) = headers.get_all_as_comma_string(name) else {
        return Ok(String::new());
    };

    let segments: Vec<&str> = joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Ok(String::new());
    }

    let len = segments.len() as i64;
    let index = if position < 0 { position + len } else { position };

    if index < 0 || index >= len {
        return Err(RuleError::PositionOutOfRange {
            header: name.to_string(),
            position,
            len: segments.len(),
        });
    }

    Ok(segments[index as usize].to_string())
}

fn eval_urlp(path: Option<&str>, param: &str) -> Result<String, RuleError> {
    let path = path.ok_or(RuleError::MissingPath)?;
    let Some((_, query)) = path.split_once('?') else {
        return Ok(String::new());
    };

    for pair in query.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            if k == param {
                return Ok(v.to_string());
            }
        } else if pair == param {
            return Ok(String::new());
        }
    }

    Ok(String::new())
}

fn eval_metadata(metadata: Option<&dyn StreamMetadata>, key: &str) -> Result<String, RuleError> {
    let metadata = metadata.ok_or(RuleError::NullMetadata)?;
    Ok(metadata
        .get(HEADER_REWRITE_FILTER_NAME, key)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DynamicMetadataStore, StreamMetadata as _};
    use pingora_http::RequestHeader;

    fn req_with_header(name: &str, value: &str) -> RequestHeader {
        let mut h = RequestHeader::build("GET", b"/", None).unwrap();
        h.insert_header(name.to_string(), value).unwrap();
        h
    }

    #[test]
    fn static_literal_evaluates_to_itself() {
        let dv = DynamicValue::parse("plain-token", true, 1).unwrap();
        assert_eq!(dv, DynamicValue::Static("plain-token".to_string()));
    }

    #[test]
    fn parses_hdr_with_default_position() {
        let dv = DynamicValue::parse("%[hdr(host)]", true, 1).unwrap();
        assert_eq!(
            dv,
            DynamicValue::Hdr {
                name: "host".to_string(),
                position: -1
            }
        );
    }

    #[test]
    fn parses_hdr_with_explicit_position() {
        let dv = DynamicValue::parse("%[hdr(host,0)]", true, 1).unwrap();
        assert_eq!(
            dv,
            DynamicValue::Hdr {
                name: "host".to_string(),
                position: 0
            }
        );
    }

    #[test]
    fn rejects_missing_closing_bracket() {
        let err = DynamicValue::parse("%[hdr(host)", true, 1).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedDynamicFunction { .. }));
    }

    #[test]
    fn urlp_on_response_is_fatal() {
        let err = DynamicValue::parse("%[urlp(p)]", false, 4).unwrap_err();
        assert_eq!(err, ConfigError::UrlpOnResponse { line: 4 });
    }

    #[test]
    fn unknown_function_is_fatal() {
        let err = DynamicValue::parse("%[nope(x)]", true, 1).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDynamicFunction { .. }));
    }

    #[test]
    fn hdr_eval_splits_trims_and_drops_empty_segments() {
        let headers = req_with_header("h", "a, b ,,c");
        let ctx = EvalContext {
            headers: &headers,
            path: None,
            metadata: None,
        };
        let dv = DynamicValue::Hdr {
            name: "h".to_string(),
            position: -1,
        };
        assert_eq!(dv.eval(&ctx).unwrap(), "c");
    }

    #[test]
    fn hdr_eval_absent_header_is_empty_string_not_error() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let ctx = EvalContext {
            headers: &headers,
            path: None,
            metadata: None,
        };
        let dv = DynamicValue::Hdr {
            name: "missing".to_string(),
            position: -1,
        };
        assert_eq!(dv.eval(&ctx).unwrap(), "");
    }

    #[test]
    fn hdr_eval_out_of_range_position_errors() {
        let headers = req_with_header("h", "a,b");
        let ctx = EvalContext {
            headers: &headers,
            path: None,
            metadata: None,
        };
        let dv = DynamicValue::Hdr {
            name: "h".to_string(),
            position: 5,
        };
        assert!(matches!(dv.eval(&ctx), Err(RuleError::PositionOutOfRange { .. })));
    }

    #[test]
    fn urlp_eval_reads_first_occurrence() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let ctx = EvalContext {
            headers: &headers,
            path: Some("/p?u=1&u=2"),
            metadata: None,
        };
        let dv = DynamicValue::Urlp {
            param: "u".to_string(),
        };
        assert_eq!(dv.eval(&ctx).unwrap(), "1");
    }

    #[test]
    fn urlp_eval_without_path_errors() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let ctx = EvalContext {
            headers: &headers,
            path: None,
            metadata: None,
        };
        let dv = DynamicValue::Urlp {
            param: "u".to_string(),
        };
        assert!(matches!(dv.eval(&ctx), Err(RuleError::MissingPath)));
    }

    #[test]
    fn metadata_eval_reads_namespaced_key() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let mut store = DynamicMetadataStore::new();
        store.set(HEADER_REWRITE_FILTER_NAME, "saved", "mock_value".to_string());
        let ctx = EvalContext {
            headers: &headers,
            path: None,
            metadata: Some(&store),
        };
        let dv = DynamicValue::Metadata {
            key: "saved".to_string(),
        };
        assert_eq!(dv.eval(&ctx).unwrap(), "mock_value");
    }

    #[test]
    fn metadata_eval_without_store_errors() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let ctx = EvalContext {
            headers: &headers,
            path: None,
            metadata: None,
        };
        let dv = DynamicValue::Metadata {
            key: "saved".to_string(),
        };
        assert!(matches!(dv.eval(&ctx), Err(RuleError::NullMetadata)));
    }
}
