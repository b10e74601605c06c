// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # hudl
//!
//! Type-safe HTML templating engine: a node-structured template language
//! with protobuf-typed inputs, rendered server-side.
//!
//! Templates declare their input schema in embedded `/** … */` blocks
//! (a proto3 subset), use backtick expressions evaluated against the
//! decoded input, and compose through named components with a single slot.
//! Reactive `~` attributes lower to `data-*` output attributes for a client
//! runtime this crate never executes.
//!
//! ## Pipeline
//!
//! ```text
//! source text → normalize → parse → schema + transform → Document
//! Document(s) → DocumentSet/Registry → Renderer + wire-decoded input → HTML
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use hudl::{parse_document, DocumentSet, Renderer, Value};
//!
//! let mut set = DocumentSet::new();
//! set.insert(parse_document("el { .card { h1#title \"Hi\" } }", "T1").unwrap());
//!
//! let rendered = Renderer::new(&set).render("T1", Value::Null).unwrap();
//! assert_eq!(rendered.html, "<div class=\"card\"><h1 id=\"title\">Hi</h1></div>");
//! ```

/// Abstract syntax tree types (raw node tree and typed AST).
pub mod ast;
/// Whole-document pipeline and multi-document sets.
pub mod document;
/// Error types and reporting.
pub mod error;
/// Expression engine (parsing and evaluation).
pub mod expr;
/// Canonical source formatter.
pub mod format;
/// Sugar normalizer (pre-parser rewrites).
pub mod normalize;
/// Strict node grammar parser.
pub mod parser;
/// Template registry with snapshot replacement.
pub mod registry;
/// Template interpreter (AST to HTML).
pub mod render;
/// Embedded IDL schema model and parsers.
pub mod schema;
/// Raw node tree to typed AST transformation.
pub mod transform;
/// The shared typed value space.
pub mod value;
/// Wire-format decoder for template inputs.
pub mod wire;

pub use ast::{Component, Node, Span};
pub use document::{load_document, parse_document, Document, DocumentSet};
pub use error::{HudlError, Result, RuntimeEvalError, SourceContext};
pub use format::format_source;
pub use normalize::normalize;
pub use parser::parse_source;
pub use registry::{Registry, RegistrySnapshot};
pub use render::{ComponentLookup, Rendered, Renderer, ResolvedComponent};
pub use schema::{parse_schema_blocks, Schema};
pub use transform::{transform_document, TransformOutput};
pub use value::Value;
pub use wire::decode_message;
