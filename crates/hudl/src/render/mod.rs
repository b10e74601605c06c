// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The template interpreter: walks typed ASTs and emits HTML.
//!
//! Rendering is fail-soft at expression granularity: an evaluation failure
//! records a [`RuntimeEvalError`] in the render's error sink and substitutes
//! an `ERROR` marker in the output. Structural problems (unknown component,
//! call cycle, exceeded deadline) are fail-fast [`HudlError::RenderError`]s.
//!
//! Escaping rules: text-position values pass through the full escaping
//! function (including quotes); attribute values use double-quoted attribute
//! escaping; `raw()` results are inserted verbatim, exactly once, at the
//! call's emission point.

pub mod reactive;
pub mod style;

use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::ast::{
    AttrValue, CasePattern, Component, Element, Expr, Node, StyleBlock, SwitchCase, TextSegment,
};
use crate::error::{HudlError, Result, RuntimeEvalError};
use crate::expr::{eval_source, Activation, Frame};
use crate::schema::Schema;
use crate::value::Value;

/// Escaping for text position: the five characters that must never reach
/// output raw from a scalar value. Attribute values use double-quoted
/// attribute escaping instead (apostrophes stay literal there).
fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Void elements: no children rendered, no closing tag emitted.
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Attributes rendered as present-without-value when truthy.
fn is_boolean_attribute(name: &str) -> bool {
    matches!(
        name,
        "disabled"
            | "checked"
            | "selected"
            | "readonly"
            | "required"
            | "autofocus"
            | "autoplay"
            | "controls"
            | "defer"
            | "hidden"
            | "loop"
            | "multiple"
            | "muted"
            | "novalidate"
            | "open"
            | "reversed"
            | "ismap"
    )
}

/// A component resolved for rendering: its definition plus the document and
/// schema it lives in.
pub struct ResolvedComponent<'a> {
    /// The owning document's logical name.
    pub document: &'a str,
    /// The component definition.
    pub component: &'a Component,
    /// The document's (import-linked) schema.
    pub schema: &'a Schema,
}

/// Component resolution through a document's import closure.
pub trait ComponentLookup {
    /// Resolves `name` as seen from `from_document` (`None` searches every
    /// document, used for render entry points).
    fn resolve(&self, from_document: Option<&str>, name: &str) -> Option<ResolvedComponent<'_>>;
}

/// A finished render: the HTML plus any soft evaluation failures.
#[derive(Debug)]
pub struct Rendered {
    /// The rendered UTF-8 HTML fragment.
    pub html: String,
    /// Evaluation failures substituted by `ERROR` markers.
    pub errors: Vec<RuntimeEvalError>,
}

/// Walks component ASTs and emits HTML.
pub struct Renderer<'a> {
    lookup: &'a dyn ComponentLookup,
    deadline: Option<Instant>,
    max_depth: usize,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer over a component lookup.
    pub fn new(lookup: &'a dyn ComponentLookup) -> Self {
        Self { lookup, deadline: None, max_depth: 64 }
    }

    /// Bounds the render by a wall-clock deadline, checked per node.
    pub fn with_deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(Instant::now() + limit);
        self
    }

    /// Renders a component with the given input value (use [`Value::Null`]
    /// for components without a declared input).
    pub fn render(&self, component: &str, input: Value) -> Result<Rendered> {
        let resolved = self.lookup.resolve(None, component).ok_or_else(|| {
            HudlError::RenderError {
                component: component.to_string(),
                span: None,
                message: format!("unknown component {component:?}"),
            }
        })?;
        self.render_component(&resolved, input, None, 0)
    }

    fn render_component(
        &self,
        resolved: &ResolvedComponent,
        input: Value,
        slot: Option<String>,
        depth: usize,
    ) -> Result<Rendered> {
        if depth >= self.max_depth {
            return Err(HudlError::RenderError {
                component: resolved.component.name.clone(),
                span: Some(resolved.component.span),
                message: "component call depth exceeded (cycle?)".to_string(),
            });
        }

        let mut ctx = Ctx {
            renderer: self,
            component: &resolved.component.name,
            document: resolved.document,
            schema: resolved.schema,
            activation: Activation::new(&input, resolved.schema),
            slot,
            depth,
            out: String::new(),
            errors: Vec::new(),
        };
        for node in &resolved.component.roots {
            ctx.walk(node)?;
        }
        Ok(Rendered { html: ctx.out, errors: ctx.errors })
    }
}

struct Ctx<'r, 'a> {
    renderer: &'r Renderer<'a>,
    component: &'r str,
    document: &'r str,
    schema: &'r Schema,
    activation: Activation<'r>,
    slot: Option<String>,
    depth: usize,
    out: String,
    errors: Vec<RuntimeEvalError>,
}

impl<'r, 'a> Ctx<'r, 'a> {
    fn check_deadline(&self, node: &Node) -> Result<()> {
        if let Some(deadline) = self.renderer.deadline {
            if Instant::now() > deadline {
                return Err(HudlError::RenderError {
                    component: self.component.to_string(),
                    span: Some(node.span()),
                    message: "render deadline exceeded".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Evaluates an expression, routing failures into the error sink.
    fn eval(&mut self, expr: &Expr) -> Option<Value> {
        match eval_source(&expr.source, &self.activation) {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors
                    .push(RuntimeEvalError { span: expr.span, message: e.message });
                None
            }
        }
    }

    fn walk(&mut self, node: &Node) -> Result<()> {
        self.check_deadline(node)?;
        match node {
            Node::Element(el) => self.element(el),
            Node::Text { segments, .. } => {
                for segment in segments {
                    match segment {
                        TextSegment::Literal(text) => {
                            self.out.push_str(&escape_text(text));
                        }
                        TextSegment::Expr(expr) => self.emit_text_expression(expr),
                    }
                }
                Ok(())
            }
            Node::Expression(expr) => {
                self.emit_text_expression(expr);
                Ok(())
            }
            Node::If { condition, then_children, else_children, .. } => {
                let truthy = self
                    .eval(condition)
                    .map(|v| v.is_truthy())
                    .unwrap_or(false);
                if truthy {
                    for child in then_children {
                        self.walk(child)?;
                    }
                } else if let Some(children) = else_children {
                    for child in children {
                        self.walk(child)?;
                    }
                }
                Ok(())
            }
            Node::Switch { subject, cases, default_children, .. } => {
                self.switch(subject, cases, default_children.as_deref())
            }
            Node::Each { binding, iterable, children, .. } => {
                self.each(binding, iterable, children)
            }
            Node::ComponentCall { name, argument, children, span } => {
                self.component_call(name, argument.as_ref(), children, *span)
            }
            Node::Slot { .. } => {
                if let Some(content) = self.slot.clone() {
                    self.out.push_str(&content);
                }
                Ok(())
            }
            // Style blocks attached to an element are emitted by `element`;
            // one at component root has nothing to scope and renders as-is.
            Node::Style(block) => {
                self.emit_style(block, "");
                Ok(())
            }
        }
    }

    /// Emits an expression in text position: escaped, except `raw()` HTML
    /// which is inserted verbatim exactly once.
    fn emit_text_expression(&mut self, expr: &Expr) {
        match self.eval(expr) {
            Some(Value::Html(html)) => self.out.push_str(&html),
            Some(value) => {
                self.out.push_str(&escape_text(&value.render_string()));
            }
            None => {
                let message = self
                    .errors
                    .last()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                self.out.push_str(&format!(
                    "<span title=\"{}\">ERROR</span>",
                    html_escape::encode_double_quoted_attribute(&message)
                ));
            }
        }
    }

    fn element(&mut self, el: &Element) -> Result<()> {
        // Scope classes for attached style blocks are decided before the
        // open tag so they land in the class attribute.
        let scopes: Vec<(usize, String)> = el
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, child)| match child {
                Node::Style(block) => {
                    Some((i, style::scope_class(self.document, block.span)))
                }
                _ => None,
            })
            .collect();

        self.out.push('<');
        self.out.push_str(&el.tag);

        if let Some(id) = &el.id {
            self.out.push_str(&format!(
                " id=\"{}\"",
                html_escape::encode_double_quoted_attribute(id)
            ));
        }

        let mut class_parts: Vec<String> = el.classes.clone();
        if let Some(AttrValue::Expr(expr)) = el.attrs.get("class") {
            match self.eval(expr) {
                Some(value) => class_parts.push(value.render_string()),
                None => class_parts.push("ERROR".to_string()),
            }
        }
        class_parts.extend(scopes.iter().map(|(_, class)| class.clone()));
        if !class_parts.is_empty() {
            self.out.push_str(&format!(
                " class=\"{}\"",
                html_escape::encode_double_quoted_attribute(&class_parts.join(" "))
            ));
        }

        for (name, value) in &el.attrs {
            if name == "class" {
                continue;
            }
            self.emit_attribute(name, value);
        }

        for attr in &el.reactive {
            let (name, value) = reactive::lower(attr);
            match value {
                Some(value) => self.out.push_str(&format!(
                    " {}=\"{}\"",
                    name,
                    html_escape::encode_double_quoted_attribute(&value)
                )),
                None => self.out.push_str(&format!(" {name}")),
            }
        }

        self.out.push('>');

        if is_void_element(&el.tag) {
            return Ok(());
        }

        for (i, child) in el.children.iter().enumerate() {
            match child {
                Node::Style(block) => {
                    let scope = scopes
                        .iter()
                        .find(|(idx, _)| *idx == i)
                        .map(|(_, class)| class.clone())
                        .unwrap_or_default();
                    self.emit_style(block, &scope);
                }
                other => self.walk(other)?,
            }
        }

        self.out.push_str(&format!("</{}>", el.tag));
        Ok(())
    }

    fn emit_attribute(&mut self, name: &str, value: &AttrValue) {
        match value {
            AttrValue::Static(text) => {
                self.out.push_str(&format!(
                    " {}=\"{}\"",
                    name,
                    html_escape::encode_double_quoted_attribute(text)
                ));
            }
            AttrValue::Expr(expr) => match self.eval(expr) {
                Some(Value::Bool(true)) => self.out.push_str(&format!(" {name}")),
                Some(Value::Bool(false)) => {}
                Some(value) if is_boolean_attribute(name) => {
                    if value.is_truthy() {
                        self.out.push_str(&format!(" {name}"));
                    }
                }
                Some(value) => {
                    self.out.push_str(&format!(
                        " {}=\"{}\"",
                        name,
                        html_escape::encode_double_quoted_attribute(&value.render_string())
                    ));
                }
                None => self.out.push_str(&format!(" {name}=\"ERROR\"")),
            },
        }
    }

    fn emit_style(&mut self, block: &StyleBlock, scope: &str) {
        self.out.push_str("<style>");
        self.out.push_str(&style::serialize(block, scope));
        self.out.push_str("</style>");
    }

    fn switch(
        &mut self,
        subject: &Expr,
        cases: &[SwitchCase],
        default_children: Option<&[Node]>,
    ) -> Result<()> {
        let Some(subject_value) = self.eval(subject) else {
            // Subject failed to evaluate: fall through to default, if any.
            if let Some(children) = default_children {
                for child in children {
                    self.walk(child)?;
                }
            }
            return Ok(());
        };

        for case in cases {
            if self.case_matches(&subject_value, &case.pattern) {
                for child in &case.children {
                    self.walk(child)?;
                }
                return Ok(());
            }
        }
        if let Some(children) = default_children {
            for child in children {
                self.walk(child)?;
            }
        }
        Ok(())
    }

    fn case_matches(&mut self, subject: &Value, pattern: &CasePattern) -> bool {
        match pattern {
            CasePattern::EnumSymbol(symbol) => match subject {
                Value::Enum { symbol: actual, .. } => actual == symbol,
                Value::Int(n) => self
                    .schema
                    .enum_for_symbol(symbol)
                    .is_some_and(|(_, number)| i64::from(number) == *n),
                _ => false,
            },
            CasePattern::StringLit(text) => match subject {
                Value::Str(s) => s == text,
                Value::Enum { symbol, .. } => symbol == text,
                _ => false,
            },
            CasePattern::Expr(expr) => {
                // The subject is the receiver: its fields resolve directly
                // and `_` names the subject itself.
                let mut vars = IndexMap::new();
                vars.insert("_".to_string(), subject.clone());
                self.activation.push(Frame::Vars(vars));
                if matches!(subject, Value::Message { .. } | Value::Map(_)) {
                    self.activation.push(Frame::Message(subject.clone()));
                }
                let result = eval_source(&expr.source, &self.activation);
                if matches!(subject, Value::Message { .. } | Value::Map(_)) {
                    self.activation.pop();
                }
                self.activation.pop();

                match result {
                    Ok(value) => value.is_truthy(),
                    Err(e) => {
                        self.errors
                            .push(RuntimeEvalError { span: expr.span, message: e.message });
                        false
                    }
                }
            }
        }
    }

    fn each(&mut self, binding: &str, iterable: &Expr, children: &[Node]) -> Result<()> {
        let Some(value) = self.eval(iterable) else {
            return Ok(());
        };

        let items: Vec<Value> = match value {
            Value::List(items) => items,
            Value::Map(map) => map
                .into_iter()
                .map(|(key, value)| {
                    let mut entry = IndexMap::new();
                    entry.insert("key".to_string(), Value::Str(key));
                    entry.insert("value".to_string(), value);
                    Value::Map(entry)
                })
                .collect(),
            Value::Null => Vec::new(),
            other => {
                self.errors.push(RuntimeEvalError {
                    span: iterable.span,
                    message: format!("each expects a list or map, got {}", other.type_name()),
                });
                return Ok(());
            }
        };

        for (index, item) in items.into_iter().enumerate() {
            let mut vars = IndexMap::new();
            vars.insert(binding.to_string(), item);
            vars.insert(format!("{binding}_idx"), Value::Int(index as i64));
            vars.insert("_index".to_string(), Value::Int(index as i64));
            self.activation.push(Frame::Vars(vars));
            let result = children.iter().try_for_each(|child| self.walk(child));
            self.activation.pop();
            result?;
        }
        Ok(())
    }

    fn component_call(
        &mut self,
        name: &str,
        argument: Option<&Expr>,
        children: &[Node],
        span: crate::ast::Span,
    ) -> Result<()> {
        let Some(resolved) = self.renderer.lookup.resolve(Some(self.document), name) else {
            return Err(HudlError::RenderError {
                component: self.component.to_string(),
                span: Some(span),
                message: format!("unknown component {name:?}"),
            });
        };

        // The argument and slot content both evaluate in the caller's scope.
        let input = match argument {
            Some(expr) => self.eval(expr).unwrap_or(Value::Null),
            None => Value::Null,
        };
        let slot = if children.is_empty() {
            None
        } else {
            Some(self.render_nodes_to_string(children)?)
        };

        let rendered = self
            .renderer
            .render_component(&resolved, input, slot, self.depth + 1)?;
        self.out.push_str(&rendered.html);
        self.errors.extend(rendered.errors);
        Ok(())
    }

    fn render_nodes_to_string(&mut self, nodes: &[Node]) -> Result<String> {
        let saved = std::mem::take(&mut self.out);
        let result = nodes.iter().try_for_each(|node| self.walk(node));
        let content = std::mem::replace(&mut self.out, saved);
        result?;
        Ok(content)
    }
}
