//! Rule variants and pure evaluation (`spec.md` §3, §4.6).
//!
//! A [`Rule`] never touches the header map or metadata store directly.
//! [`Rule::plan`] evaluates the guard condition and every dynamic value
//! the rule needs and hands back an [`Effect`] describing the mutation to
//! apply; [`crate::program::Program`] is the only place that actually
//! mutates anything. This keeps dynamic-value evaluation provably pure
//! (`spec.md` §8 invariant 1) and matches the two-phase "evaluate, then
//! apply" ordering §4.6 requires.

use crate::condition::ConditionAst;
use crate::error::RuleError;
use crate::headers::HeaderMap;
use crate::value::{DynamicValue, EvalContext};

/// A single configured action, optionally guarded by `if <condition>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    SetHeader {
        key: DynamicValue,
        value: DynamicValue,
        cond: Option<ConditionAst>,
    },
    AppendHeader {
        key: DynamicValue,
        values: Vec<DynamicValue>,
        cond: Option<ConditionAst>,
    },
    /// Request only; the builder never places one of these in the
    /// response rule list (`spec.md` invariant 2).
    SetPath {
        path: DynamicValue,
        cond: Option<ConditionAst>,
    },
    SetMetadata {
        key: DynamicValue,
        value: DynamicValue,
        cond: Option<ConditionAst>,
    },
}

/// The mutation a rule resolved to, with every dynamic value already
/// evaluated to an owned string. `Skip` means the guard condition was
/// false; the caller applies nothing and moves to the next rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetHeader { key: String, value: String },
    AppendHeader { key: String, values: Vec<String> },
    SetPath { path: String },
    SetMetadata { key: String, value: String },
    Skip,
}

impl Rule {
    fn condition(&self) -> Option<&ConditionAst> {
        match self {
            Rule::SetHeader { cond, .. }
            | Rule::AppendHeader { cond, .. }
            | Rule::SetPath { cond, .. }
            | Rule::SetMetadata { cond, .. } => cond.as_ref(),
        }
    }

    /// Evaluate this rule's guard and dynamic values against `ctx`.
    ///
    /// Per `spec.md` §4.6: a condition evaluation error or any dynamic
    /// value evaluation error causes this single rule to be skipped; the
    /// caller is expected to log and continue rather than propagate.
    pub fn plan<H: HeaderMap>(
        &self,
        bools: &crate::predicate::BooleanProgram,
        ctx: &EvalContext<'_, H>,
    ) -> Result<Effect, RuleError> {
        if let Some(cond) = self.condition() {
            if !cond.evaluate(bools, ctx)? {
                return Ok(Effect::Skip);
            }
        }

        match self {
            Rule::SetHeader { key, value, .. } => Ok(Effect::SetHeader {
                key: key.eval(ctx)?,
                value: value.eval(ctx)?,
            }),
            Rule::AppendHeader { key, values, .. } => {
                let key = key.eval(ctx)?;
                let mut evaluated = Vec::with_capacity(values.len());
                for v in values {
                    evaluated.push(v.eval(ctx)?);
                }
                Ok(Effect::AppendHeader {
                    key,
                    values: evaluated,
                })
            }
            Rule::SetPath { path, .. } => Ok(Effect::SetPath { path: path.eval(ctx)? }),
            Rule::SetMetadata { key, value, .. } => {
                let key = key.eval(ctx)?;
                let value = value.eval(ctx)?;
                if key.is_empty() || value.is_empty() {
                    return Err(RuleError::EmptyMetadataKeyOrValue);
                }
                Ok(Effect::SetMetadata { key, value })
            }
        }
    }
}

/// Split `:path` at the first `?`, per `spec.md` §4.6 / §8 invariant 5.
pub fn apply_set_path(current_path: &str, new_path: &str) -> String {
    match current_path.split_once('?') {
        Some((_, query)) => format!("{new_path}?{query}"),
        None => new_path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::BooleanProgram;
    use indexmap::IndexMap;
    use pingora_http::RequestHeader;

    fn empty_ctx(headers: &RequestHeader) -> EvalContext<'_, RequestHeader> {
        EvalContext {
            headers,
            path: None,
            metadata: None,
        }
    }

    #[test]
    fn set_header_plans_replace_effect() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let bools: BooleanProgram = IndexMap::new();
        let rule = Rule::SetHeader {
            key: DynamicValue::Static("x-foo".to_string()),
            value: DynamicValue::Static("b".to_string()),
            cond: None,
        };
        let effect = rule.plan(&bools, &empty_ctx(&headers)).unwrap();
        assert_eq!(
            effect,
            Effect::SetHeader {
                key: "x-foo".to_string(),
                value: "b".to_string()
            }
        );
    }

    #[test]
    fn append_header_plans_all_values_in_order() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let bools: BooleanProgram = IndexMap::new();
        let rule = Rule::AppendHeader {
            key: DynamicValue::Static("x-foo".to_string()),
            values: vec![
                DynamicValue::Static("b".to_string()),
                DynamicValue::Static("c".to_string()),
            ],
            cond: None,
        };
        let effect = rule.plan(&bools, &empty_ctx(&headers)).unwrap();
        assert_eq!(
            effect,
            Effect::AppendHeader {
                key: "x-foo".to_string(),
                values: vec!["b".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn set_path_preserves_query_string() {
        assert_eq!(apply_set_path("/old?u=1", "/new"), "/new?u=1");
        assert_eq!(apply_set_path("/old", "/new"), "/new");
    }

    #[test]
    fn set_metadata_rejects_empty_key_or_value() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        let bools: BooleanProgram = IndexMap::new();
        let rule = Rule::SetMetadata {
            key: DynamicValue::Static(String::new()),
            value: DynamicValue::Static("v".to_string()),
            cond: None,
        };
        assert!(matches!(
            rule.plan(&bools, &empty_ctx(&headers)),
            Err(RuleError::EmptyMetadataKeyOrValue)
        ));
    }
}
