// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the hudl templating engine.
//!
//! This module defines [`HudlError`], the main error enum, and helper types
//! for rich error reporting with source context.
//!
//! # Error Categories
//!
//! - **Syntax errors**: node grammar violations
//! - **Schema errors**: embedded IDL parse or resolution failures
//! - **Transform errors**: structural misuse of control flow or sugar
//! - **Decode errors**: wire-format input that does not fit the schema
//! - **Render errors**: structural problems that prevent rendering
//! - **IO errors**: filesystem failures in the loader and watcher
//!
//! Expression evaluation failures are deliberately *not* part of this enum:
//! they fail soft. The interpreter collects them as [`RuntimeEvalError`]
//! values in the render context's error sink and keeps going.
//!
//! # Source Context
//!
//! Syntax and schema errors include [`SourceContext`] for rich error
//! messages showing the problematic code with line numbers and a caret
//! pointing at the exact error location.

use std::fmt;

use thiserror::Error;

use crate::ast::Span;

/// Source context for enhanced error messages.
///
/// Captures a snippet of source code around an error location,
/// enabling rich error messages with line numbers and visual indicators.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the source file.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from source code and error location.
    ///
    /// Captures 3 lines before and after the error line for context.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(3).max(1);
        let snippet_end = (line + 3).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the source snippet with line numbers and error indicator.
    ///
    /// Returns a string like:
    /// ```text
    ///    4 | .card {
    ///    5 |   h1#title# "Hi"
    ///      |           ^
    ///    6 | }
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            if line_num > self.lines.len() {
                break;
            }

            let line = &self.lines[line_num - 1];
            let is_error_line = line_num == self.error_line;

            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if is_error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Helper struct for displaying optional source context.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl<'a> fmt::Display for OptSourceContextDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "{}", ctx),
            None => write!(f, ""),
        }
    }
}

/// Helper trait for formatting optional source context.
pub trait AsDisplay<'a> {
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> OptSourceContextDisplay<'a>;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

/// A non-fatal expression evaluation failure.
///
/// These are appended to the render context's error sink; the interpreter
/// substitutes an `ERROR` marker in the output and continues.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeEvalError {
    /// Source location of the failing expression.
    pub span: Span,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for RuntimeEvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "evaluation error at line {}, column {}: {}",
            self.span.line, self.span.column, self.message
        )
    }
}

/// The main error type for hudl operations.
///
/// All fallible hudl functions return `Result<T, HudlError>` to provide
/// detailed error information for diagnostics and HTTP error bodies.
#[derive(Error, Debug)]
pub enum HudlError {
    /// Node grammar violation.
    #[error("Syntax error in {file:?}: {message} at line {line}, column {column}\n{}", source_context.as_display())]
    SyntaxError {
        /// Description of the syntax error.
        message: String,
        /// Line number where the error occurred.
        line: usize,
        /// Column number where the error occurred.
        column: usize,
        /// The file path, if known.
        file: Option<String>,
        /// Source context for rich error display.
        source_context: Option<SourceContext>,
    },

    /// Embedded schema parse or resolution failure.
    #[error("Schema error in {file:?}: {message} at line {line}, column {column}")]
    SchemaError {
        /// Description of the schema error.
        message: String,
        /// Line number within the source document.
        line: usize,
        /// Column number within the source document.
        column: usize,
        /// The file path, if known.
        file: Option<String>,
    },

    /// Structural misuse of control flow or reactive sugar.
    #[error("Transform error: {message} at line {line}, column {column}")]
    TransformError {
        /// Description of the structural problem.
        message: String,
        /// Line number where the offending node starts.
        line: usize,
        /// Column number where the offending node starts.
        column: usize,
    },

    /// Wire-format input could not be decoded against the declared schema.
    #[error("Decode error at offset {offset}: {message}")]
    DecodeError {
        /// Byte offset into the input where decoding failed.
        offset: usize,
        /// Description of the failure.
        message: String,
    },

    /// Structural problem preventing render.
    #[error("Render error in {component}: {message}")]
    RenderError {
        /// The component being rendered.
        component: String,
        /// Source location, when attributable.
        span: Option<Span>,
        /// Description of the failure.
        message: String,
    },

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl HudlError {
    /// Builds a syntax error at a span, without source context.
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        HudlError::SyntaxError {
            message: message.into(),
            line: span.line,
            column: span.column,
            file: None,
            source_context: None,
        }
    }

    /// Builds a transform error at a span.
    pub fn transform(message: impl Into<String>, span: Span) -> Self {
        HudlError::TransformError {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }

    /// Builds a schema error at a span.
    pub fn schema(message: impl Into<String>, span: Span) -> Self {
        HudlError::SchemaError {
            message: message.into(),
            line: span.line,
            column: span.column,
            file: None,
        }
    }

    /// Attaches a file path to syntax and schema errors; other variants are
    /// returned unchanged.
    pub fn with_file(self, path: &str) -> Self {
        match self {
            HudlError::SyntaxError { message, line, column, source_context, .. } => {
                HudlError::SyntaxError {
                    message,
                    line,
                    column,
                    file: Some(path.to_string()),
                    source_context,
                }
            }
            HudlError::SchemaError { message, line, column, .. } => HudlError::SchemaError {
                message,
                line,
                column,
                file: Some(path.to_string()),
            },
            other => other,
        }
    }

    /// The 1-based line/column this error points at, when it carries one.
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            HudlError::SyntaxError { line, column, .. }
            | HudlError::SchemaError { line, column, .. }
            | HudlError::TransformError { line, column, .. } => Some((*line, *column)),
            HudlError::RenderError { span: Some(span), .. } => Some((span.line, span.column)),
            _ => None,
        }
    }
}

/// Convenience type alias for Results with [`HudlError`].
pub type Result<T> = std::result::Result<T, HudlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_column() {
        let source = "el {\n  h1#title# \"Hi\"\n}\n";
        let ctx = SourceContext::from_source(source, 2, 12);
        let snippet = ctx.format_snippet();
        assert!(snippet.contains("   2 |   h1#title# \"Hi\""));
        assert!(snippet.contains("     |            ^"));
    }

    #[test]
    fn with_file_attaches_path() {
        let err = HudlError::syntax("unexpected token", Span::new(0, 1, 3, 7)).with_file("a.hudl");
        match err {
            HudlError::SyntaxError { file, line, column, .. } => {
                assert_eq!(file.as_deref(), Some("a.hudl"));
                assert_eq!((line, column), (3, 7));
            }
            _ => panic!("expected SyntaxError"),
        }
    }
}
