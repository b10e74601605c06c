// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Expression parser: pest grammar plus a Pratt pass for operator
//! precedence.

use lazy_static::lazy_static;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::expr::eval::EvalError;

/// Pest parser for the expression grammar.
#[derive(Parser)]
#[grammar = "grammar/expr.pest"]
pub struct ExprParser;

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::infix(Rule::op_eq, Assoc::Left)
            | Op::infix(Rule::op_ne, Assoc::Left)
            | Op::infix(Rule::op_in, Assoc::Left))
        .op(Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left))
        .op(Op::prefix(Rule::op_not) | Op::prefix(Rule::op_neg))
        .op(Op::postfix(Rule::member_call)
            | Op::postfix(Rule::member)
            | Op::postfix(Rule::index)
            | Op::postfix(Rule::call_args));
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprAst {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// Null literal.
    Null,
    /// Identifier resolved against the activation stack.
    Ident(String),
    /// Field access `base.field`.
    Member {
        /// Receiver expression.
        base: Box<ExprAst>,
        /// Field name.
        field: String,
    },
    /// Index or key access `base[index]`.
    Index {
        /// Receiver expression.
        base: Box<ExprAst>,
        /// Index expression.
        index: Box<ExprAst>,
    },
    /// Global function call `name(args…)`.
    Call {
        /// Function name.
        function: String,
        /// Arguments, unevaluated.
        args: Vec<ExprAst>,
    },
    /// Method call `base.name(args…)`.
    Method {
        /// Receiver expression.
        base: Box<ExprAst>,
        /// Method name.
        method: String,
        /// Arguments, unevaluated.
        args: Vec<ExprAst>,
    },
    /// Unary operator application.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<ExprAst>,
    },
    /// Binary operator application.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<ExprAst>,
        /// Right operand.
        right: Box<ExprAst>,
    },
    /// List literal.
    List(Vec<ExprAst>),
    /// Map literal with expression keys.
    MapLit(Vec<(ExprAst, ExprAst)>),
}

/// Binary operators, in the usual precedence groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `||` with short-circuit.
    Or,
    /// `&&` with short-circuit.
    And,
    /// `==` deep equality.
    Eq,
    /// `!=`.
    Ne,
    /// `<`.
    Lt,
    /// `<=`.
    Le,
    /// `>`.
    Gt,
    /// `>=`.
    Ge,
    /// `+` (numbers, string/list concatenation).
    Add,
    /// `-`.
    Sub,
    /// `*`.
    Mul,
    /// `/`.
    Div,
    /// `%` (integers).
    Mod,
    /// `in` membership test.
    In,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Neg,
}

/// Parses expression source into an [`ExprAst`].
pub fn parse_expression(source: &str) -> Result<ExprAst, EvalError> {
    let mut pairs = ExprParser::parse(Rule::expression, source).map_err(|e| EvalError {
        message: format!("invalid expression: {}", e.variant.message()),
    })?;
    let expression = pairs.next().expect("expression rule");
    let expr = expression
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .expect("expr under expression");
    Ok(build_expr(expr.into_inner()))
}

fn build_expr(pairs: Pairs<Rule>) -> ExprAst {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::op_not => UnaryOp::Not,
                Rule::op_neg => UnaryOp::Neg,
                rule => unreachable!("unexpected prefix {rule:?}"),
            };
            ExprAst::Unary { op, operand: Box::new(operand) }
        })
        .map_postfix(|base, op| build_postfix(base, op))
        .map_infix(|left, op, right| {
            let op = match op.as_rule() {
                Rule::op_or => BinaryOp::Or,
                Rule::op_and => BinaryOp::And,
                Rule::op_eq => BinaryOp::Eq,
                Rule::op_ne => BinaryOp::Ne,
                Rule::op_lt => BinaryOp::Lt,
                Rule::op_le => BinaryOp::Le,
                Rule::op_gt => BinaryOp::Gt,
                Rule::op_ge => BinaryOp::Ge,
                Rule::op_add => BinaryOp::Add,
                Rule::op_sub => BinaryOp::Sub,
                Rule::op_mul => BinaryOp::Mul,
                Rule::op_div => BinaryOp::Div,
                Rule::op_mod => BinaryOp::Mod,
                Rule::op_in => BinaryOp::In,
                rule => unreachable!("unexpected infix {rule:?}"),
            };
            ExprAst::Binary { op, left: Box::new(left), right: Box::new(right) }
        })
        .parse(pairs)
}

fn build_primary(pair: Pair<Rule>) -> ExprAst {
    match pair.as_rule() {
        Rule::int_lit => ExprAst::Int(pair.as_str().parse().unwrap_or(0)),
        Rule::float_lit => ExprAst::Float(pair.as_str().parse().unwrap_or(0.0)),
        Rule::dq_string | Rule::sq_string => {
            let text = pair.as_str();
            ExprAst::Str(unescape(&text[1..text.len() - 1]))
        }
        Rule::bool_lit => ExprAst::Bool(pair.as_str() == "true"),
        Rule::null_lit => ExprAst::Null,
        Rule::ident => ExprAst::Ident(pair.as_str().to_string()),
        Rule::paren => build_expr(
            pair.into_inner()
                .next()
                .expect("paren inner")
                .into_inner(),
        ),
        Rule::list_lit => ExprAst::List(
            pair.into_inner()
                .map(|item| build_expr(item.into_inner()))
                .collect(),
        ),
        Rule::map_lit => ExprAst::MapLit(
            pair.into_inner()
                .map(|entry| {
                    let mut parts = entry.into_inner();
                    let key = build_expr(parts.next().expect("map key").into_inner());
                    let value = build_expr(parts.next().expect("map value").into_inner());
                    (key, value)
                })
                .collect(),
        ),
        rule => unreachable!("unexpected primary {rule:?}"),
    }
}

fn build_postfix(base: ExprAst, op: Pair<Rule>) -> ExprAst {
    match op.as_rule() {
        Rule::member => {
            let field = op.into_inner().next().expect("member ident");
            ExprAst::Member {
                base: Box::new(base),
                field: field.as_str().to_string(),
            }
        }
        Rule::member_call => {
            let mut parts = op.into_inner();
            let method = parts.next().expect("method ident").as_str().to_string();
            let args = parts
                .next()
                .expect("method args")
                .into_inner()
                .map(|arg| build_expr(arg.into_inner()))
                .collect();
            ExprAst::Method { base: Box::new(base), method, args }
        }
        Rule::index => {
            let inner = op.into_inner().next().expect("index expr");
            ExprAst::Index {
                base: Box::new(base),
                index: Box::new(build_expr(inner.into_inner())),
            }
        }
        Rule::call_args => {
            let args: Vec<ExprAst> = op
                .into_inner()
                .map(|arg| build_expr(arg.into_inner()))
                .collect();
            match base {
                ExprAst::Ident(function) => ExprAst::Call { function, args },
                // `(expr)(…)` and friends: represent as a call on a synthetic
                // name so evaluation can report "not callable".
                other => ExprAst::Method {
                    base: Box::new(other),
                    method: String::new(),
                    args,
                },
            }
        }
        rule => unreachable!("unexpected postfix {rule:?}"),
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_precedence() {
        let ast = parse_expression("1 + 2 * 3").unwrap();
        match ast {
            ExprAst::Binary { op: BinaryOp::Add, right, .. } => match *right {
                ExprAst::Binary { op: BinaryOp::Mul, .. } => {}
                other => panic!("expected mul on the right, got {other:?}"),
            },
            other => panic!("expected add at the root, got {other:?}"),
        }
    }

    #[test]
    fn parses_member_chains_and_calls() {
        let ast = parse_expression("user.name.matches('^A')").unwrap();
        match ast {
            ExprAst::Method { base, method, args } => {
                assert_eq!(method, "matches");
                assert_eq!(args.len(), 1);
                assert!(matches!(*base, ExprAst::Member { .. }));
            }
            other => panic!("expected method call, got {other:?}"),
        }
    }

    #[test]
    fn parses_index_and_global_call() {
        let ast = parse_expression("size(m[\"k\"])").unwrap();
        match ast {
            ExprAst::Call { function, args } => {
                assert_eq!(function, "size");
                assert!(matches!(args[0], ExprAst::Index { .. }));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parses_unary_and_logic() {
        let ast = parse_expression("!done && count > 0").unwrap();
        assert!(matches!(ast, ExprAst::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn parses_index_loop_var() {
        let ast = parse_expression("_index + 1").unwrap();
        match ast {
            ExprAst::Binary { op: BinaryOp::Add, left, .. } => {
                assert_eq!(*left, ExprAst::Ident("_index".to_string()));
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn parses_literals() {
        assert_eq!(parse_expression("null").unwrap(), ExprAst::Null);
        assert_eq!(parse_expression("true").unwrap(), ExprAst::Bool(true));
        assert_eq!(parse_expression("2.5").unwrap(), ExprAst::Float(2.5));
        assert_eq!(
            parse_expression("'it\\'s'").unwrap(),
            ExprAst::Str("it's".to_string())
        );
    }

    #[test]
    fn parses_in_operator() {
        let ast = parse_expression("'a' in tags").unwrap();
        assert!(matches!(ast, ExprAst::Binary { op: BinaryOp::In, .. }));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_expression("1 +").is_err());
        assert!(parse_expression("").is_err());
    }
}
