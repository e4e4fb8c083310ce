//! Match predicates and the boolean variable table (`spec.md` §3, §4.3).

use indexmap::IndexMap;

use crate::error::RuleError;
use crate::headers::HeaderMap;
use crate::value::{DynamicValue, EvalContext};

/// How a [`BooleanVar`] compares its source value to its comparand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `source == comparand`.
    Exact,
    /// Source is a prefix of the comparand.
    ///
    /// This preserves the original filter's `comparand.find(source) == 0`
    /// behavior verbatim: it is the *source* that must prefix the
    /// *comparand*, not the usual "comparand starts with a literal
    /// prefix" reading. `spec.md` §9 open question 1 flags this for
    /// product sign-off; until then the engine keeps it as-is.
    Prefix,
    /// Source appears anywhere within the comparand.
    Substr,
    /// Source is non-empty.
    Found,
}

impl MatchKind {
    pub fn from_token(token: &str) -> Option<MatchKind> {
        match token {
            "str" => Some(MatchKind::Exact),
            "beg" => Some(MatchKind::Prefix),
            "sub" => Some(MatchKind::Substr),
            "found" => Some(MatchKind::Found),
            _ => None,
        }
    }

    /// `beg`/`sub`/`str` take exactly one comparand token; `found` takes none.
    pub fn requires_comparand(self) -> bool {
        !matches!(self, MatchKind::Found)
    }
}

/// A `set-bool` definition: a dynamic source value, a match kind, and
/// (for every kind but `found`) a comparand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanVar {
    pub source: DynamicValue,
    pub kind: MatchKind,
    /// `DynamicValue::Static(String::new())` when `kind == Found`.
    pub comparand: DynamicValue,
}

impl BooleanVar {
    pub fn evaluate<H: HeaderMap>(&self, ctx: &EvalContext<'_, H>) -> Result<bool, RuleError> {
        let source = self.source.eval(ctx)?;
        if source.is_empty() {
            return Ok(false);
        }

        Ok(match self.kind {
            MatchKind::Exact => source == self.comparand.eval(ctx)?,
            MatchKind::Prefix => self.comparand.eval(ctx)?.starts_with(&source),
            MatchKind::Substr => self.comparand.eval(ctx)?.contains(&source),
            MatchKind::Found => true,
        })
    }
}

/// Insertion-ordered mapping from name to [`BooleanVar`] for one
/// direction, per `spec.md` §3's data model. Names are unique within a
/// direction.
pub type BooleanProgram = IndexMap<String, BooleanVar>;

#[cfg(test)]
mod tests {
    use super::*;
    use pingora_http::RequestHeader;

    fn ctx(headers: &RequestHeader) -> EvalContext<'_, RequestHeader> {
        EvalContext {
            headers,
            path: None,
            metadata: None,
        }
    }

    fn var(kind: MatchKind, source: &str, comparand: &str) -> BooleanVar {
        BooleanVar {
            source: DynamicValue::Static(source.to_string()),
            kind,
            comparand: DynamicValue::Static(comparand.to_string()),
        }
    }

    #[test]
    fn exact_requires_nonempty_source_and_equality() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        assert!(var(MatchKind::Exact, "api.example.com", "api.example.com")
            .evaluate(&ctx(&headers))
            .unwrap());
        assert!(!var(MatchKind::Exact, "a", "b").evaluate(&ctx(&headers)).unwrap());
        assert!(!var(MatchKind::Exact, "", "").evaluate(&ctx(&headers)).unwrap());
    }

    #[test]
    fn prefix_checks_source_is_prefix_of_comparand() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        // source "api" IS a prefix of comparand "api.example.com" -> true
        assert!(var(MatchKind::Prefix, "api", "api.example.com")
            .evaluate(&ctx(&headers))
            .unwrap());
        // comparand is not a prefix of source in the conventional sense,
        // and that reading is deliberately not what this kind checks
        assert!(!var(MatchKind::Prefix, "api.example.com", "api")
            .evaluate(&ctx(&headers))
            .unwrap());
    }

    #[test]
    fn substr_checks_source_within_comparand() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        assert!(var(MatchKind::Substr, "example", "api.example.com")
            .evaluate(&ctx(&headers))
            .unwrap());
        assert!(!var(MatchKind::Substr, "nope", "api.example.com")
            .evaluate(&ctx(&headers))
            .unwrap());
    }

    #[test]
    fn found_is_true_for_any_nonempty_source() {
        let headers = RequestHeader::build("GET", b"/", None).unwrap();
        assert!(var(MatchKind::Found, "x", "").evaluate(&ctx(&headers)).unwrap());
        assert!(!var(MatchKind::Found, "", "").evaluate(&ctx(&headers)).unwrap());
    }
}
