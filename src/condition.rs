//! Condition parsing and precedence-aware evaluation (`spec.md` §4.4-4.5).

use crate::error::{ConfigError, RuleError};
use crate::headers::HeaderMap;
use crate::predicate::BooleanProgram;
use crate::value::EvalContext;

/// A binary boolean combinator between two condition terms. `not` is
/// folded into its operand at parse time and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// `a or b and c or not d` parsed into operands `[(a,false),(b,false),
/// (c,false),(d,true)]` and operators `[Or,And,Or]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionAst {
    operands: Vec<(String, bool)>,
    operators: Vec<BoolOp>,
}

impl ConditionAst {
    /// Parse the tokens following `if` on a rule line.
    ///
    /// `bools` is this direction's boolean table; every operand name must
    /// already be defined there (`spec.md` invariant 1).
    pub fn parse(tokens: &[&str], bools: &BooleanProgram, line: usize) -> Result<ConditionAst, ConfigError> {
        if tokens.is_empty() {
            return Err(ConfigError::ConditionSyntax {
                line,
                reason: "condition is empty".to_string(),
            });
        }

        let mut operands = Vec::new();
        let mut operators = Vec::new();
        let mut idx = 0;
        let mut expect_operand = true;

        while idx < tokens.len() {
            let tok = tokens[idx];

            if expect_operand {
                match tok {
                    "and" | "or" => {
                        return Err(ConfigError::ConditionSyntax {
                            line,
                            reason: "condition cannot start with, or contain two adjacent, binary operators".to_string(),
                        });
                    }
                    "not" => {
                        idx += 1;
                        let Some(&next) = tokens.get(idx) else {
                            return Err(ConfigError::ConditionSyntax {
                                line,
                                reason: "`not` must be followed by an operand".to_string(),
                            });
                        };
                        if next == "and" || next == "or" || next == "not" {
                            return Err(ConfigError::ConditionSyntax {
                                line,
                                reason: "`not` must be followed by an operand".to_string(),
                            });
                        }
                        operands.push((next.to_string(), true));
                        idx += 1;
                    }
                    name => {
                        operands.push((name.to_string(), false));
                        idx += 1;
                    }
                }
                expect_operand = false;
            } else {
                match tok {
                    "and" => {
                        operators.push(BoolOp::And);
                        idx += 1;
                        expect_operand = true;
                    }
                    "or" => {
                        operators.push(BoolOp::Or);
                        idx += 1;
                        expect_operand = true;
                    }
                    _ => {
                        return Err(ConfigError::ConditionSyntax {
                            line,
                            reason: format!("expected `and` or `or`, found `{tok}`"),
                        });
                    }
                }
            }
        }

        if expect_operand {
            return Err(ConfigError::ConditionSyntax {
                line,
                reason: "condition cannot end with an operator".to_string(),
            });
        }

        if operators.len() != operands.len() - 1 {
            return Err(ConfigError::ConditionSyntax {
                line,
                reason: "mismatched operand/operator counts".to_string(),
            });
        }

        for (name, _) in &operands {
            if !bools.contains_key(name) {
                return Err(ConfigError::UndefinedBooleanVar {
                    line,
                    name: name.clone(),
                });
            }
        }

        Ok(ConditionAst { operands, operators })
    }

    /// `and` binds tighter than `or`: partition the operator list around
    /// every `or` boundary, evaluate each `and`-only run left-to-right,
    /// then `or` the group results together.
    pub fn evaluate<H: HeaderMap>(
        &self,
        bools: &BooleanProgram,
        ctx: &EvalContext<'_, H>,
    ) -> Result<bool, RuleError> {
        let mut values = Vec::with_capacity(self.operands.len());
        for (name, negated) in &self.operands {
            let var = bools
                .get(name)
                .ok_or_else(|| RuleError::UnknownBooleanVar { name: name.clone() })?;
            let value = var.evaluate(ctx)?;
            values.push(if *negated { !value } else { value });
        }

        let mut group = values[0];
        let mut or_groups = Vec::new();
        for (op, &value) in self.operators.iter().zip(values[1..].iter()) {
            match op {
                BoolOp::And => group = group && value,
                BoolOp::Or => {
                    or_groups.push(group);
                    group = value;
                }
            }
        }
        or_groups.push(group);

        Ok(or_groups.into_iter().any(|g| g))
    }
}
