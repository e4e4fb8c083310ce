//! The program builder and filter runtime (`spec.md` §4.1, §4.7, §5).
//!
//! [`Program::parse`] never panics and never fails outright: a fatal
//! parse error is captured into `Program.error` and the whole program
//! becomes a documented pass-through (`spec.md` §4.7's `Errored` state).
//! [`Program::run_request`] / [`Program::run_response`] are the only
//! places that mutate a real header map or metadata store; every rule is
//! planned purely first (see `crate::rule::Rule::plan`) and only then
//! applied, matching the evaluate-then-apply ordering pingsix's plugins
//! follow when they first build a value and then call `insert_header`.

use indexmap::IndexMap;

use crate::condition::ConditionAst;
use crate::error::ConfigError;
use crate::headers::{HeaderMap, RequestHeaderMap};
use crate::lexer::{split_lines, Line};
use crate::metadata::{StreamMetadata, HEADER_REWRITE_FILTER_NAME};
use crate::predicate::{BooleanProgram, BooleanVar, MatchKind};
use crate::rule::{apply_set_path, Effect, Rule};
use crate::value::{DynamicValue, EvalContext};

/// Which side of the stream a line of the DSL applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// A parsed (or failed-to-parse) header rewrite program.
///
/// Per `spec.md` §4.7: `error.is_some()` means the whole program is
/// `Errored` and both [`Program::run_request`] and
/// [`Program::run_response`] become no-ops.
#[derive(Debug, Default)]
pub struct Program {
    pub request_rules: Vec<Rule>,
    pub response_rules: Vec<Rule>,
    pub request_bools: BooleanProgram,
    pub response_bools: BooleanProgram,
    pub error: Option<ConfigError>,
}

impl Program {
    /// Parse `config` into a [`Program`]. Always returns a value; a fatal
    /// error is recorded on `.error` rather than propagated.
    pub fn parse(config: &str) -> Program {
        let lines = split_lines(config);
        match build(&lines) {
            Ok(program) => program,
            Err(err) => {
                log::error!("header-rewrite: {err}");
                Program {
                    error: Some(err),
                    ..Program::default()
                }
            }
        }
    }

    /// Apply this program to a request, mutating `headers` and
    /// `metadata` in place. A no-op if the program is errored.
    pub fn run_request<H, M>(&self, headers: &mut H, metadata: &mut M)
    where
        H: RequestHeaderMap,
        M: StreamMetadata,
    {
        if self.error.is_some() {
            return;
        }

        for rule in &self.request_rules {
            let path = headers.get_path();
            let planned = {
                let ctx = EvalContext {
                    headers: &*headers,
                    path: Some(path.as_str()),
                    metadata: Some(&*metadata),
                };
                rule.plan(&self.request_bools, &ctx)
            };
            match planned {
                Err(e) => log::warn!("header-rewrite: skipping request rule: {e}"),
                Ok(effect) => apply_request_effect(effect, headers, metadata, &path),
            }
        }
    }

    /// Apply this program to a response, mutating `headers` and
    /// `metadata` in place. A no-op if the program is errored.
    pub fn run_response<H, M>(&self, headers: &mut H, metadata: &mut M)
    where
        H: HeaderMap,
        M: StreamMetadata,
    {
        if self.error.is_some() {
            return;
        }

        for rule in &self.response_rules {
            let planned = {
                let ctx = EvalContext {
                    headers: &*headers,
                    path: None,
                    metadata: Some(&*metadata),
                };
                rule.plan(&self.response_bools, &ctx)
            };
            match planned {
                Err(e) => log::warn!("header-rewrite: skipping response rule: {e}"),
                Ok(effect) => apply_response_effect(effect, headers, metadata),
            }
        }
    }
}

fn log_mutation_err(result: Result<(), crate::error::RuleError>) {
    if let Err(e) = result {
        log::warn!("header-rewrite: {e}");
    }
}

fn apply_request_effect<H: RequestHeaderMap, M: StreamMetadata>(
    effect: Effect,
    headers: &mut H,
    metadata: &mut M,
    current_path: &str,
) {
    match effect {
        Effect::Skip => {}
        Effect::SetHeader { key, value } => log_mutation_err(headers.set(&key, &value)),
        Effect::AppendHeader { key, values } => {
            for value in values {
                log_mutation_err(headers.append(&key, &value));
            }
        }
        Effect::SetPath { path } => {
            let new_path = apply_set_path(current_path, &path);
            log_mutation_err(headers.set_path(&new_path));
        }
        Effect::SetMetadata { key, value } => metadata.set(HEADER_REWRITE_FILTER_NAME, &key, value),
    }
}

fn apply_response_effect<H: HeaderMap, M: StreamMetadata>(effect: Effect, headers: &mut H, metadata: &mut M) {
    match effect {
        Effect::Skip => {}
        Effect::SetHeader { key, value } => log_mutation_err(headers.set(&key, &value)),
        Effect::AppendHeader { key, values } => {
            for value in values {
                log_mutation_err(headers.append(&key, &value));
            }
        }
        Effect::SetMetadata { key, value } => metadata.set(HEADER_REWRITE_FILTER_NAME, &key, value),
        // The builder never places a `set-path` rule in the response
        // list (spec invariant 2); kept as a defensive no-op.
        Effect::SetPath { .. } => {}
    }
}

const MIN_ARITY: &[(&str, usize)] = &[
    ("set-header", 4),
    ("append-header", 4),
    ("set-path", 3),
    ("set-bool", 6),
    ("set-metadata", 4),
];

fn min_arity(op: &str) -> usize {
    MIN_ARITY
        .iter()
        .find(|(name, _)| *name == op)
        .map(|(_, n)| *n)
        .expect("op already validated against the known operation set")
}

fn direction_of(token: &str, line: usize) -> Result<Direction, ConfigError> {
    match token {
        "http-request" => Ok(Direction::Request),
        "http-response" => Ok(Direction::Response),
        other => Err(ConfigError::UnknownDirection {
            line,
            token: other.to_string(),
        }),
    }
}

/// Two-pass build: every `set-bool` is collected first so that an `if`
/// condition may reference a boolean defined later in the file
/// (`spec.md` §5, "set-bool definitions take effect globally").
fn build(lines: &[Line<'_>]) -> Result<Program, ConfigError> {
    let mut request_bools: BooleanProgram = IndexMap::new();
    let mut response_bools: BooleanProgram = IndexMap::new();

    for line in lines {
        let direction = direction_of(line.tokens[0], line.number)?;
        let Some(op) = line.tokens.get(1) else {
            return Err(ConfigError::TooFewArguments {
                line: line.number,
                op: String::new(),
            });
        };
        if *op != "set-bool" {
            validate_known_operation(op, line.number)?;
            continue;
        }

        let bools = match direction {
            Direction::Request => &mut request_bools,
            Direction::Response => &mut response_bools,
        };
        let (name, var) = parse_set_bool(line, direction)?;
        if bools.contains_key(&name) {
            return Err(ConfigError::DuplicateBooleanVar {
                line: line.number,
                name,
            });
        }
        bools.insert(name, var);
    }

    let mut request_rules = Vec::new();
    let mut response_rules = Vec::new();

    for line in lines {
        let direction = direction_of(line.tokens[0], line.number)?;
        let op = line.tokens[1];
        if op == "set-bool" {
            continue;
        }

        let bools = match direction {
            Direction::Request => &request_bools,
            Direction::Response => &response_bools,
        };
        let is_request = direction == Direction::Request;
        let rule = parse_rule(line, op, is_request, bools)?;

        if matches!(rule, Rule::SetPath { .. }) && !is_request {
            return Err(ConfigError::SetPathOnResponse { line: line.number });
        }

        match direction {
            Direction::Request => request_rules.push(rule),
            Direction::Response => response_rules.push(rule),
        }
    }

    Ok(Program {
        request_rules,
        response_rules,
        request_bools,
        response_bools,
        error: None,
    })
}

fn validate_known_operation(op: &str, line: usize) -> Result<(), ConfigError> {
    if MIN_ARITY.iter().any(|(name, _)| *name == op) {
        Ok(())
    } else {
        Err(ConfigError::UnknownOperation {
            line,
            token: op.to_string(),
        })
    }
}

/// Split `args` at the first literal `if`, returning `(head, Some(cond))`
/// or `(args, None)` when there is none.
fn split_condition<'a>(args: &'a [&'a str]) -> (&'a [&'a str], Option<&'a [&'a str]>) {
    match args.iter().position(|&t| t == "if") {
        Some(idx) => (&args[..idx], Some(&args[idx + 1..])),
        None => (args, None),
    }
}

fn parse_condition(
    cond_tokens: Option<&[&str]>,
    bools: &BooleanProgram,
    line: usize,
) -> Result<Option<ConditionAst>, ConfigError> {
    match cond_tokens {
        Some(tokens) => Ok(Some(ConditionAst::parse(tokens, bools, line)?)),
        None => Ok(None),
    }
}

fn parse_rule(line: &Line<'_>, op: &str, is_request: bool, bools: &BooleanProgram) -> Result<Rule, ConfigError> {
    validate_known_operation(op, line.number)?;
    if line.tokens.len() < min_arity(op) {
        return Err(ConfigError::TooFewArguments {
            line: line.number,
            op: op.to_string(),
        });
    }

    let args = &line.tokens[2..];

    match op {
        "set-header" => {
            let (head, cond_tokens) = split_condition(args);
            if head.len() != 2 {
                return Err(ConfigError::TooFewArguments {
                    line: line.number,
                    op: op.to_string(),
                });
            }
            let key = DynamicValue::parse(head[0], is_request, line.number)?;
            let value = DynamicValue::parse(head[1], is_request, line.number)?;
            let cond = parse_condition(cond_tokens, bools, line.number)?;
            Ok(Rule::SetHeader { key, value, cond })
        }
        "append-header" => {
            let (head, cond_tokens) = split_condition(args);
            if head.len() < 2 {
                return Err(ConfigError::TooFewArguments {
                    line: line.number,
                    op: op.to_string(),
                });
            }
            let key = DynamicValue::parse(head[0], is_request, line.number)?;
            let mut values = Vec::with_capacity(head.len() - 1);
            for tok in &head[1..] {
                values.push(DynamicValue::parse(tok, is_request, line.number)?);
            }
            let cond = parse_condition(cond_tokens, bools, line.number)?;
            Ok(Rule::AppendHeader { key, values, cond })
        }
        "set-path" => {
            let (head, cond_tokens) = split_condition(args);
            if head.len() != 1 {
                return Err(ConfigError::TooFewArguments {
                    line: line.number,
                    op: op.to_string(),
                });
            }
            let path = DynamicValue::parse(head[0], is_request, line.number)?;
            let cond = parse_condition(cond_tokens, bools, line.number)?;
            Ok(Rule::SetPath { path, cond })
        }
        "set-metadata" => {
            let (head, cond_tokens) = split_condition(args);
            if head.len() != 2 {
                return Err(ConfigError::TooFewArguments {
                    line: line.number,
                    op: op.to_string(),
                });
            }
            let key = DynamicValue::parse(head[0], is_request, line.number)?;
            let value = DynamicValue::parse(head[1], is_request, line.number)?;
            let cond = parse_condition(cond_tokens, bools, line.number)?;
            Ok(Rule::SetMetadata { key, value, cond })
        }
        _ => unreachable!("set-bool is handled in the first pass"),
    }
}

/// `set-bool <name> <source> -m <kind> [<comparand>]`. No trailing `if`.
fn parse_set_bool(line: &Line<'_>, direction: Direction) -> Result<(String, BooleanVar), ConfigError> {
    let is_request = direction == Direction::Request;
    let args = &line.tokens[2..];
    if args.len() < 4 {
        return Err(ConfigError::TooFewArguments {
            line: line.number,
            op: "set-bool".to_string(),
        });
    }

    let name = args[0].to_string();
    let source = DynamicValue::parse(args[1], is_request, line.number)?;

    if args[2] != "-m" {
        return Err(ConfigError::MissingMatchMarker { line: line.number });
    }

    let Some(kind) = MatchKind::from_token(args[3]) else {
        return Err(ConfigError::UnknownMatchKind {
            line: line.number,
            token: args[3].to_string(),
        });
    };

    let comparand = if kind.requires_comparand() {
        if args.len() != 5 {
            return Err(ConfigError::BadMatchArity {
                line: line.number,
                kind: args[3].to_string(),
            });
        }
        DynamicValue::parse(args[4], is_request, line.number)?
    } else {
        if args.len() != 4 {
            return Err(ConfigError::BadMatchArity {
                line: line.number,
                kind: args[3].to_string(),
            });
        }
        DynamicValue::Static(String::new())
    };

    Ok((name, BooleanVar { source, kind, comparand }))
}
