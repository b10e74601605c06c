// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Expression engine: parsing and evaluation of the embedded expression
//! language.
//!
//! Expressions live inside backticks in template source. They are parsed
//! with the pest grammar in `grammar/expr.pest` and evaluated against an
//! [`Activation`] (the render context's variable stack) over the shared
//! [`Value`](crate::value::Value) space.
//!
//! Evaluation **fails soft**: every error is an [`EvalError`] the caller
//! turns into a `RuntimeEvalError` in the render's error sink, never a
//! panic and never a hard render failure. Evaluation errors are distinct
//! from a typed null result, which keeps `has()` semantics intact.

mod eval;
mod parse;

pub use eval::{evaluate, Activation, EvalError, Frame};
pub use parse::{parse_expression, BinaryOp, ExprAst, UnaryOp};

use crate::value::Value;

/// Parses and evaluates expression source in one step.
pub fn eval_source(source: &str, activation: &Activation) -> Result<Value, EvalError> {
    let ast = parse_expression(source)?;
    evaluate(&ast, activation)
}
