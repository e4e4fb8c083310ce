//! Error strata for the header rewrite engine.
//!
//! The spec draws a hard line between two kinds of failure: a
//! [`ConfigError`] is fatal and discovered once, at parse time, and a
//! [`RuleError`] is non-fatal and can be raised anew on every request or
//! response. Neither ever panics or aborts the host; both just carry
//! enough context for a single useful log line.

use std::fmt;

use pingora_error::Error;

/// A fatal, build-time failure of the DSL parser or program builder.
///
/// Any one of these marks the whole [`crate::Program`] as errored (see
/// `spec.md` §4.7); the filter then bypasses both directions for every
/// stream bound to that program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// First token on a line was neither `http-request` nor `http-response`.
    UnknownDirection { line: usize, token: String },
    /// Second token did not name a known operation.
    UnknownOperation { line: usize, token: String },
    /// Line had fewer tokens than the operation's minimum arity requires.
    TooFewArguments { line: usize, op: String },
    /// `set-bool`'s `-m` kind was not `str`, `beg`, `sub`, or `found`.
    UnknownMatchKind { line: usize, token: String },
    /// `set-bool` arity did not match what the match kind requires.
    BadMatchArity { line: usize, kind: String },
    /// `set-bool`'s third token was not the literal `-m`.
    MissingMatchMarker { line: usize },
    /// A `%[fn(...)]` dynamic value token was malformed.
    MalformedDynamicFunction { line: usize, token: String },
    /// `%[fn(...)]` named a function this engine does not support.
    UnknownDynamicFunction { line: usize, name: String },
    /// A dynamic function was called with the wrong number of arguments.
    BadFunctionArity { line: usize, name: String },
    /// `urlp(...)` appeared on the response side.
    UrlpOnResponse { line: usize },
    /// `set-path` appeared on the response side.
    SetPathOnResponse { line: usize },
    /// A condition referenced a boolean name not defined in this direction.
    UndefinedBooleanVar { line: usize, name: String },
    /// Two `set-bool` definitions in the same direction reused a name.
    DuplicateBooleanVar { line: usize, name: String },
    /// `if <condition>` violated one of the syntax rules in spec §4.4.
    ConditionSyntax { line: usize, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownDirection { line, token } => {
                write!(f, "line {line}: unknown direction `{token}`")
            }
            ConfigError::UnknownOperation { line, token } => {
                write!(f, "line {line}: unknown operation `{token}`")
            }
            ConfigError::TooFewArguments { line, op } => {
                write!(f, "line {line}: too few arguments for `{op}`")
            }
            ConfigError::UnknownMatchKind { line, token } => {
                write!(f, "line {line}: unknown match kind `{token}`")
            }
            ConfigError::BadMatchArity { line, kind } => {
                write!(f, "line {line}: wrong number of arguments for match kind `{kind}`")
            }
            ConfigError::MissingMatchMarker { line } => {
                write!(f, "line {line}: set-bool is missing the `-m` marker")
            }
            ConfigError::MalformedDynamicFunction { line, token } => {
                write!(f, "line {line}: malformed dynamic value `{token}`")
            }
            ConfigError::UnknownDynamicFunction { line, name } => {
                write!(f, "line {line}: unknown dynamic function `{name}`")
            }
            ConfigError::BadFunctionArity { line, name } => {
                write!(f, "line {line}: wrong number of arguments for `{name}`")
            }
            ConfigError::UrlpOnResponse { line } => {
                write!(f, "line {line}: urlp() is only valid on the request side")
            }
            ConfigError::SetPathOnResponse { line } => {
                write!(f, "line {line}: set-path is only valid on the request side")
            }
            ConfigError::UndefinedBooleanVar { line, name } => {
                write!(f, "line {line}: condition references undefined boolean `{name}`")
            }
            ConfigError::DuplicateBooleanVar { line, name } => {
                write!(f, "line {line}: boolean `{name}` is already defined for this direction")
            }
            ConfigError::ConditionSyntax { line, reason } => {
                write!(f, "line {line}: invalid condition: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Box<Error> {
    fn from(err: ConfigError) -> Self {
        Box::new(Error::new_str(&err.to_string()))
    }
}

/// A non-fatal, per-rule failure encountered while evaluating a rule
/// against a live request or response. Per `spec.md` §7, only the rule
/// that raised it is skipped; the program as a whole keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// `hdr(name, position)` position fell outside `[0, len)`.
    PositionOutOfRange { header: String, position: i64, len: usize },
    /// `urlp(...)` was evaluated without a `:path` to parse.
    MissingPath,
    /// `metadata(...)` or `set-metadata` ran with no metadata store attached.
    NullMetadata,
    /// `set-metadata` evaluated to an empty key or value.
    EmptyMetadataKeyOrValue,
    /// A condition referenced a boolean name missing from the table.
    ///
    /// Should never happen: `spec.md` invariant 1 guarantees name
    /// resolution at parse time. Kept as a defensive fallback per §7.
    UnknownBooleanVar { name: String },
    /// The host rejected a header or path mutation (e.g. invalid bytes).
    HostRejected { reason: String },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::PositionOutOfRange { header, position, len } => write!(
                f,
                "position {position} out of range for header `{header}` with {len} segment(s)"
            ),
            RuleError::MissingPath => write!(f, "no :path available for urlp()"),
            RuleError::NullMetadata => write!(f, "stream metadata store is not attached"),
            RuleError::EmptyMetadataKeyOrValue => {
                write!(f, "set-metadata evaluated to an empty key or value")
            }
            RuleError::UnknownBooleanVar { name } => {
                write!(f, "condition referenced undefined boolean `{name}`")
            }
            RuleError::HostRejected { reason } => write!(f, "host rejected mutation: {reason}"),
        }
    }
}

impl std::error::Error for RuleError {}
