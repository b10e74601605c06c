// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Raw node tree to typed AST transformation.
//!
//! This is where the surface language's conveniences are resolved:
//!
//! - **Selector shorthand**: `h1#title.big` splits into tag/id/classes;
//!   a leading `.` or `#` implies a `div`.
//! - **Metadata comments**: `// name: X` and `// data: T` preceding a
//!   top-level element configure the component built from its children.
//! - **Control-flow lifting**: `if`/`else`, `switch`/`case`/`default` and
//!   `each` nodes become their tagged variants, with structural misuse
//!   reported as transform errors.
//! - **Reactive sugar**: inline `~name=value` properties, `~ { … }` child
//!   blocks and the `tag~>signal` binding shorthand all lower to the common
//!   [`ReactiveAttr`] representation.
//! - **Component calls**: capitalized node names become calls; `#content`
//!   is the slot marker.
//! - **Imports**: `import { "path" }` nodes collect document dependencies.
//!
//! Non-structural problems (a `data:` type missing from the schema,
//! unresolved schema references) are collected as diagnostics rather than
//! failing the transform, so a document stays servable while being edited.

use lazy_static::lazy_static;
use regex::Regex;

use crate::ast::{
    AttrValue, CasePattern, Component, Element, Expr, Node, RawComment, RawDocument, RawItem,
    RawNode, RawValue, RawValueKind, ReactiveAttr, ReactiveKind, ReactiveModifier, Span,
    StyleBlock, StyleDeclaration, StyleRule, SwitchCase, TextSegment,
};
use crate::error::{HudlError, Result};
use crate::schema::Schema;

lazy_static! {
    static ref TAG_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").unwrap();
    static ref IDENT: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref META_COMMENT: Regex = Regex::new(r"^(name|data):\s*([A-Za-z_][A-Za-z0-9_.]*)$").unwrap();
}

/// The reserved slot marker node name.
pub const SLOT_MARKER: &str = "#content";

/// Result of transforming one document.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    /// Components defined by the document, in source order.
    pub components: Vec<Component>,
    /// Declared document imports (paths relative to the document).
    pub imports: Vec<String>,
    /// Non-fatal problems: missing data types, unresolved schema references.
    pub diagnostics: Vec<String>,
}

/// Transforms a raw document into components, using `doc_name` (the file
/// stem) as the name of a single unannotated component.
pub fn transform_document(
    raw: &RawDocument,
    schema: &Schema,
    doc_name: &str,
) -> Result<TransformOutput> {
    let mut out = TransformOutput::default();
    let mut pending_name: Option<String> = None;
    let mut pending_data: Option<String> = None;

    for item in &raw.items {
        match item {
            RawItem::Comment(comment) => {
                if let Some((key, value)) = parse_metadata(comment) {
                    match key {
                        "name" => pending_name = Some(value),
                        _ => pending_data = Some(value),
                    }
                }
            }
            RawItem::Schema(_) => {}
            RawItem::Text(text) => {
                return Err(HudlError::transform(
                    "text content is only allowed inside a component",
                    text.span,
                ));
            }
            RawItem::Node(node) if node.name == "import" => {
                collect_imports(node, &mut out.imports)?;
            }
            RawItem::Node(node) => {
                let name = match pending_name.take() {
                    Some(name) => name,
                    None => doc_name.to_string(),
                };
                let data_type = pending_data.take();

                if out.components.iter().any(|c| c.name == name) {
                    return Err(HudlError::transform(
                        format!("duplicate component name {name:?}"),
                        node.span,
                    ));
                }
                if let Some(ty) = &data_type {
                    if schema.message(ty).is_none() {
                        out.diagnostics.push(format!(
                            "component {name:?} declares data type {ty:?} which is not in the schema"
                        ));
                    }
                }

                let children = node.children.as_deref().unwrap_or(&[]);
                let roots = transform_items(children)?;

                let slots = count_slots(&roots);
                if slots > 1 {
                    return Err(HudlError::transform(
                        format!("component {name:?} has {slots} slot markers, at most one is allowed"),
                        node.span,
                    ));
                }

                out.components.push(Component { name, data_type, roots, span: node.span });
            }
        }
    }

    for missing in schema.unresolved_references() {
        out.diagnostics
            .push(format!("schema references unknown type {missing:?}"));
    }

    Ok(out)
}

fn parse_metadata(comment: &RawComment) -> Option<(&'static str, String)> {
    if comment.block {
        return None;
    }
    let caps = META_COMMENT.captures(comment.text.trim())?;
    let value = caps.get(2)?.as_str().to_string();
    match caps.get(1)?.as_str() {
        "name" => Some(("name", value)),
        _ => Some(("data", value)),
    }
}

fn collect_imports(node: &RawNode, imports: &mut Vec<String>) -> Result<()> {
    let mut add = |value: &RawValue| match &value.kind {
        RawValueKind::Str(path) | RawValueKind::Raw(path) => {
            if !imports.contains(path) {
                imports.push(path.clone());
            }
            Ok(())
        }
        RawValueKind::Word(_) => Err(HudlError::transform(
            "import paths must be string literals",
            value.span,
        )),
    };

    for value in &node.values {
        add(value)?;
    }
    for item in node.children.as_deref().unwrap_or(&[]) {
        match item {
            RawItem::Text(text) => add(&RawValue { kind: text.value.clone(), span: text.span })?,
            RawItem::Comment(_) => {}
            other => {
                return Err(HudlError::transform(
                    "import blocks may only contain string paths",
                    other.span(),
                ))
            }
        }
    }
    Ok(())
}

fn count_slots(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Slot { .. } => 1,
            Node::Element(el) => count_slots(&el.children),
            Node::If { then_children, else_children, .. } => {
                count_slots(then_children)
                    + else_children.as_deref().map(count_slots).unwrap_or(0)
            }
            Node::Switch { cases, default_children, .. } => {
                cases.iter().map(|c| count_slots(&c.children)).sum::<usize>()
                    + default_children.as_deref().map(count_slots).unwrap_or(0)
            }
            Node::Each { children, .. } => count_slots(children),
            Node::ComponentCall { children, .. } => count_slots(children),
            _ => 0,
        })
        .sum()
}

/// Transforms a sibling list, pairing `else` with the preceding `if`.
fn transform_items(items: &[RawItem]) -> Result<Vec<Node>> {
    let visible: Vec<&RawItem> = items
        .iter()
        .filter(|item| !matches!(item, RawItem::Comment(_) | RawItem::Schema(_)))
        .collect();

    let mut nodes = Vec::new();
    let mut i = 0;
    while i < visible.len() {
        match visible[i] {
            RawItem::Text(text) => {
                nodes.push(text_node(&text.value, text.span));
                i += 1;
            }
            RawItem::Node(node) => match node.name.as_str() {
                "if" => {
                    // `else` must immediately follow its `if` as a sibling.
                    let else_children = match visible.get(i + 1) {
                        Some(RawItem::Node(next)) if next.name == "else" => {
                            if !next.values.is_empty() || !next.props.is_empty() {
                                return Err(HudlError::transform(
                                    "else takes no values",
                                    next.span,
                                ));
                            }
                            Some(transform_items(next.children.as_deref().unwrap_or(&[]))?)
                        }
                        _ => None,
                    };
                    let consumed = if else_children.is_some() { 2 } else { 1 };
                    nodes.push(build_if(node, else_children)?);
                    i += consumed;
                }
                "else" => {
                    return Err(HudlError::transform(
                        "else without a matching if",
                        node.span,
                    ));
                }
                "switch" => {
                    nodes.push(build_switch(node)?);
                    i += 1;
                }
                "case" | "default" => {
                    return Err(HudlError::transform(
                        format!("{} is only allowed inside a switch", node.name),
                        node.span,
                    ));
                }
                "each" => {
                    nodes.push(build_each(node)?);
                    i += 1;
                }
                "style" => {
                    nodes.push(Node::Style(build_style(node)?));
                    i += 1;
                }
                SLOT_MARKER => {
                    if node.children.is_some() || !node.values.is_empty() {
                        return Err(HudlError::transform(
                            "the slot marker takes no values or children",
                            node.span,
                        ));
                    }
                    nodes.push(Node::Slot { span: node.span });
                    i += 1;
                }
                "import" => {
                    return Err(HudlError::transform(
                        "imports are only allowed at document scope",
                        node.span,
                    ));
                }
                "~" => {
                    return Err(HudlError::transform(
                        "a reactive attribute block must be the child of an element",
                        node.span,
                    ));
                }
                name if is_component_name(name) => {
                    nodes.push(build_component_call(node)?);
                    i += 1;
                }
                _ => {
                    nodes.push(Node::Element(build_element(node)?));
                    i += 1;
                }
            },
            RawItem::Comment(_) | RawItem::Schema(_) => unreachable!("filtered above"),
        }
    }
    Ok(nodes)
}

/// Components are distinguished from elements by a capitalized name.
fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn expression_from(value: &RawValue) -> Expr {
    match value.kind.as_expression() {
        Some(source) => Expr::new(source, value.span),
        None => Expr::new(value.kind.text(), value.span),
    }
}

fn text_node(value: &RawValueKind, span: Span) -> Node {
    match value.as_expression() {
        Some(source) => Node::Expression(Expr::new(source, span)),
        None => Node::Text { segments: split_interpolation(value.text(), span), span },
    }
}

/// Splits a text literal at backticks into literal and expression segments.
fn split_interpolation(text: &str, span: Span) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut rest = text;
    loop {
        match rest.find('`') {
            None => {
                if !rest.is_empty() || segments.is_empty() {
                    segments.push(TextSegment::Literal(rest.to_string()));
                }
                return segments;
            }
            Some(open) => {
                let Some(close) = rest[open + 1..].find('`') else {
                    // Unterminated interpolation: keep the rest literal.
                    segments.push(TextSegment::Literal(rest.to_string()));
                    return segments;
                };
                if open > 0 {
                    segments.push(TextSegment::Literal(rest[..open].to_string()));
                }
                segments.push(TextSegment::Expr(Expr::new(
                    &rest[open + 1..open + 1 + close],
                    span,
                )));
                rest = &rest[open + close + 2..];
            }
        }
    }
}

fn build_if(node: &RawNode, else_children: Option<Vec<Node>>) -> Result<Node> {
    let condition = node
        .values
        .first()
        .map(expression_from)
        .ok_or_else(|| HudlError::transform("if requires a condition expression", node.span))?;
    let then_children = transform_items(node.children.as_deref().unwrap_or(&[]))?;
    Ok(Node::If { condition, then_children, else_children, span: node.span })
}

fn build_switch(node: &RawNode) -> Result<Node> {
    let subject = node
        .values
        .first()
        .map(expression_from)
        .ok_or_else(|| HudlError::transform("switch requires a subject expression", node.span))?;

    let mut cases = Vec::new();
    let mut default_children: Option<Vec<Node>> = None;

    for item in node.children.as_deref().unwrap_or(&[]) {
        let child = match item {
            RawItem::Node(child) => child,
            RawItem::Comment(_) | RawItem::Schema(_) => continue,
            RawItem::Text(text) => {
                return Err(HudlError::transform(
                    "switch children must be case or default blocks",
                    text.span,
                ))
            }
        };
        match child.name.as_str() {
            "case" => {
                let pattern = match child.values.first() {
                    Some(value) => case_pattern(value),
                    None => {
                        return Err(HudlError::transform("case requires a pattern", child.span))
                    }
                };
                let children = transform_items(child.children.as_deref().unwrap_or(&[]))?;
                cases.push(SwitchCase { pattern, children, span: child.span });
            }
            "default" => {
                if default_children.is_some() {
                    return Err(HudlError::transform(
                        "switch allows at most one default block",
                        child.span,
                    ));
                }
                default_children =
                    Some(transform_items(child.children.as_deref().unwrap_or(&[]))?);
            }
            other => {
                return Err(HudlError::transform(
                    format!("unexpected {other:?} inside switch"),
                    child.span,
                ))
            }
        }
    }

    if cases.is_empty() {
        return Err(HudlError::transform(
            "switch requires at least one case",
            node.span,
        ));
    }

    Ok(Node::Switch { subject, cases, default_children, span: node.span })
}

fn case_pattern(value: &RawValue) -> CasePattern {
    match &value.kind {
        RawValueKind::Str(s) => CasePattern::StringLit(s.clone()),
        RawValueKind::Word(w) => CasePattern::EnumSymbol(w.clone()),
        RawValueKind::Raw(_) => match value.kind.as_expression() {
            Some(source) => CasePattern::Expr(Expr::new(source, value.span)),
            None => CasePattern::StringLit(value.kind.text().to_string()),
        },
    }
}

fn build_each(node: &RawNode) -> Result<Node> {
    let binding = match node.values.first() {
        Some(RawValue { kind: RawValueKind::Word(word), .. }) if IDENT.is_match(word) => {
            word.clone()
        }
        _ => {
            return Err(HudlError::transform(
                "each requires a loop binding identifier",
                node.span,
            ))
        }
    };
    let iterable = node
        .values
        .get(1)
        .map(expression_from)
        .ok_or_else(|| HudlError::transform("each requires an iterable expression", node.span))?;
    let children = transform_items(node.children.as_deref().unwrap_or(&[]))?;
    Ok(Node::Each { binding, iterable, children, span: node.span })
}

// --- Elements --------------------------------------------------------------

fn build_element(node: &RawNode) -> Result<Element> {
    // Binding shorthand: `input~>signal` lowers to a bind reactive attribute.
    let (selector, bind_signal) = match node.name.split_once("~>") {
        Some((selector, signal)) if !signal.is_empty() => (selector, Some(signal.to_string())),
        _ => (node.name.as_str(), None),
    };

    // Special links: `_stylesheet "/app.css"` is a `<link rel="stylesheet">`.
    let special_rel = selector
        .strip_prefix('_')
        .filter(|rel| TAG_NAME.is_match(rel))
        .map(str::to_string);

    let (tag, id_from_selector, classes) = match &special_rel {
        Some(_) => ("link".to_string(), None, Vec::new()),
        None => split_selector(selector, node.span)?,
    };

    let mut element = Element {
        tag,
        id: id_from_selector,
        classes,
        attrs: Default::default(),
        reactive: Vec::new(),
        children: Vec::new(),
        self_closing: node.children.is_none() && node.values.is_empty(),
        span: node.span,
    };

    if let Some(signal) = bind_signal {
        element.reactive.push(ReactiveAttr {
            kind: ReactiveKind::Bind,
            modifiers: Vec::new(),
            value: Some(signal),
            span: node.span,
        });
    }

    let mut values = node.values.as_slice();
    if let Some(rel) = special_rel {
        element.attrs.insert("rel".to_string(), AttrValue::Static(rel));
        if let Some(first) = values.first() {
            element.attrs.insert("href".to_string(), attr_value(first));
            values = &values[1..];
        }
        element.self_closing = true;
    }

    for prop in &node.props {
        if let Some(spec) = prop.name.strip_prefix('~') {
            element
                .reactive
                .push(parse_reactive_spec(spec, Some(&prop.value), prop.span)?);
            continue;
        }
        match prop.name.as_str() {
            "class" => match &prop.value.kind {
                RawValueKind::Raw(_) if prop.value.kind.as_expression().is_some() => {
                    insert_attr(&mut element, "class", attr_value(&prop.value), prop.span)?;
                }
                other => {
                    element
                        .classes
                        .extend(other.text().split_whitespace().map(str::to_string));
                }
            },
            "id" => {
                if element.id.is_some() {
                    return Err(HudlError::transform("duplicate id", prop.span));
                }
                element.id = Some(prop.value.kind.text().to_string());
            }
            name => {
                insert_attr(&mut element, name, attr_value(&prop.value), prop.span)?;
            }
        }
    }

    // Positional values become leading text/expression children.
    for value in values {
        element.children.push(text_node(&value.kind, value.span));
    }

    // Children: reactive blocks are pulled out, everything else recurses.
    let mut rest = Vec::new();
    for item in node.children.as_deref().unwrap_or(&[]) {
        match item {
            RawItem::Node(child) if child.name == "~" => {
                reactive_specs_from_block(child, &mut element.reactive)?;
            }
            other => rest.push(other.clone()),
        }
    }
    element.children.extend(transform_items(&rest)?);

    Ok(element)
}

fn insert_attr(element: &mut Element, name: &str, value: AttrValue, span: Span) -> Result<()> {
    if element.attrs.contains_key(name) {
        return Err(HudlError::transform(
            format!("duplicate attribute {name:?}"),
            span,
        ));
    }
    element.attrs.insert(name.to_string(), value);
    Ok(())
}

fn attr_value(value: &RawValue) -> AttrValue {
    match value.kind.as_expression() {
        Some(source) => AttrValue::Expr(Expr::new(source, value.span)),
        None => AttrValue::Static(value.kind.text().to_string()),
    }
}

/// Splits selector shorthand: the segment before any `.`/`#` is the tag
/// (elided tag implies `div`), `#x` sets the id, `.x` appends a class.
fn split_selector(selector: &str, span: Span) -> Result<(String, Option<String>, Vec<String>)> {
    let mut tag = String::new();
    let mut id = None;
    let mut classes = Vec::new();
    let mut current = String::new();
    let mut kind = ' ';

    let mut commit = |kind: char, text: &str| -> Result<()> {
        match kind {
            ' ' => tag = text.to_string(),
            '#' => {
                if id.is_some() {
                    return Err(HudlError::transform("duplicate id in selector", span));
                }
                id = Some(text.to_string());
            }
            _ => classes.push(text.to_string()),
        }
        Ok(())
    };

    for ch in selector.chars() {
        if ch == '.' || ch == '#' {
            if !current.is_empty() || kind == ' ' {
                commit(kind, &current)?;
            }
            current.clear();
            kind = ch;
        } else {
            current.push(ch);
        }
    }
    commit(kind, &current)?;

    let tag = if tag.is_empty() { "div".to_string() } else { tag };
    if !TAG_NAME.is_match(&tag) {
        return Err(HudlError::transform(
            format!("invalid element name {tag:?}"),
            span,
        ));
    }
    if id.as_deref() == Some("") || classes.iter().any(String::is_empty) {
        return Err(HudlError::transform("empty selector segment", span));
    }

    Ok((tag, id, classes))
}

// --- Reactive sugar --------------------------------------------------------

/// A `let:` value is a computed signal when it contains any operator or call
/// outside string literals; otherwise it is a static signal.
fn is_computed_signal(value: &str) -> bool {
    let mut in_quote: Option<char> = None;
    for ch in value.chars() {
        match in_quote {
            Some(q) => {
                if ch == q {
                    in_quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => in_quote = Some(ch),
                '(' | ')' | '+' | '-' | '*' | '/' | '%' | '<' | '>' | '!' | '&' | '|' | '?' => {
                    return true
                }
                _ => {}
            },
        }
    }
    false
}

/// Parses one reactive spec name (without the leading `~`) plus its value.
fn parse_reactive_spec(
    name: &str,
    value: Option<&RawValue>,
    span: Span,
) -> Result<ReactiveAttr> {
    let mut parts = name.split('~');
    let head = parts.next().unwrap_or_default();
    let modifiers = parts
        .map(|part| match part.split_once(':') {
            Some((name, value)) => ReactiveModifier {
                name: name.to_string(),
                value: Some(strip_numeric_shim(value)),
            },
            None => ReactiveModifier { name: part.to_string(), value: None },
        })
        .collect();

    let value_text = value.map(reactive_value_text);

    let kind = if let Some(class) = head.strip_prefix('.') {
        ReactiveKind::Class { name: class.to_string() }
    } else if let Some((ns, sub)) = head.split_once(':') {
        match ns {
            "let" => ReactiveKind::Let {
                name: sub.to_string(),
                computed: value_text.as_deref().is_some_and(is_computed_signal),
            },
            "on" => ReactiveKind::On { event: sub.to_string() },
            "class" => ReactiveKind::Class { name: sub.to_string() },
            other => {
                return Err(HudlError::transform(
                    format!("unknown reactive attribute namespace {other:?}"),
                    span,
                ))
            }
        }
    } else {
        match head {
            "bind" => ReactiveKind::Bind,
            "show" => ReactiveKind::Show,
            "text" => ReactiveKind::Text,
            "persist" => ReactiveKind::Persist,
            "ref" => ReactiveKind::Ref,
            "teleport" => ReactiveKind::Teleport,
            "scrollIntoView" => ReactiveKind::ScrollIntoView,
            attr => ReactiveKind::Attr { name: attr.to_string() },
        }
    };

    Ok(ReactiveAttr { kind, modifiers, value: value_text, span })
}

fn reactive_value_text(value: &RawValue) -> String {
    match value.kind.as_expression() {
        Some(expr) => expr.to_string(),
        None => match &value.kind {
            RawValueKind::Word(word) => strip_numeric_shim(word),
            other => other.text().to_string(),
        },
    }
}

/// Strips the normalizer's underscore shim from `_10px`-style tokens.
fn strip_numeric_shim(word: &str) -> String {
    match word.strip_prefix('_') {
        Some(rest) if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) => rest.to_string(),
        _ => word.to_string(),
    }
}

/// Lowers the entries of a `~ { … }` block. Each child node contributes one
/// or more specs: the node name starts a spec, a following non-starter value
/// attaches to it, and starter-shaped words (`.class`, `on:…`) open the next
/// spec on the same line.
fn reactive_specs_from_block(block: &RawNode, out: &mut Vec<ReactiveAttr>) -> Result<()> {
    for item in block.children.as_deref().unwrap_or(&[]) {
        let node = match item {
            RawItem::Node(node) => node,
            RawItem::Comment(_) | RawItem::Schema(_) => continue,
            RawItem::Text(text) => {
                return Err(HudlError::transform(
                    "expected a reactive attribute spec",
                    text.span,
                ))
            }
        };

        if node.children.is_some() {
            return Err(HudlError::transform(
                "reactive attribute specs cannot have children",
                node.span,
            ));
        }

        let mut current = parse_reactive_spec(node.name.trim_start_matches('~'), None, node.span)?;
        for value in &node.values {
            if let RawValueKind::Word(word) = &value.kind {
                if is_spec_starter(word) {
                    out.push(current);
                    current =
                        parse_reactive_spec(word.trim_start_matches('~'), None, value.span)?;
                    continue;
                }
            }
            if current.value.is_none() {
                current.value = Some(reactive_value_text(value));
                // Signal kind depends on the value, which arrives after the
                // name in space form.
                if let ReactiveKind::Let { computed, .. } = &mut current.kind {
                    *computed = current
                        .value
                        .as_deref()
                        .is_some_and(is_computed_signal);
                }
            } else {
                return Err(HudlError::transform(
                    "reactive attribute already has a value",
                    value.span,
                ));
            }
        }
        out.push(current);

        // `name=value` entries are complete specs of their own.
        for prop in &node.props {
            out.push(parse_reactive_spec(
                prop.name.trim_start_matches('~'),
                Some(&prop.value),
                prop.span,
            )?);
        }
    }
    Ok(())
}

/// Words that open a new spec when seen in value position on the same line.
fn is_spec_starter(word: &str) -> bool {
    word.starts_with('.')
        || word.starts_with('~')
        || (word.contains(':') && !word.starts_with('$') && !word.starts_with('@'))
        || matches!(
            word,
            "bind" | "show" | "text" | "persist" | "ref" | "teleport" | "scrollIntoView"
        )
}

fn build_component_call(node: &RawNode) -> Result<Node> {
    let argument = node.values.first().map(expression_from);
    if node.values.len() > 1 {
        return Err(HudlError::transform(
            "a component call takes at most one input expression",
            node.span,
        ));
    }
    if !node.props.is_empty() {
        return Err(HudlError::transform(
            "component calls do not take attributes",
            node.span,
        ));
    }
    let children = transform_items(node.children.as_deref().unwrap_or(&[]))?;
    Ok(Node::ComponentCall {
        name: node.name.clone(),
        argument,
        children,
        span: node.span,
    })
}

// --- Styles ----------------------------------------------------------------

fn build_style(node: &RawNode) -> Result<StyleBlock> {
    let rules = style_rules(node.children.as_deref().unwrap_or(&[]))?;
    Ok(StyleBlock { rules, span: node.span })
}

fn style_rules(items: &[RawItem]) -> Result<Vec<StyleRule>> {
    let mut rules = Vec::new();
    for item in items {
        let node = match item {
            RawItem::Node(node) => node,
            RawItem::Comment(_) | RawItem::Schema(_) => continue,
            RawItem::Text(text) => {
                return Err(HudlError::transform(
                    "style blocks contain rules, not text",
                    text.span,
                ))
            }
        };
        if node.children.is_none() {
            return Err(HudlError::transform(
                format!("style rule {:?} requires a declaration block", node.name),
                node.span,
            ));
        }

        // The selector is the node name plus any positional words
        // (`.card h1 { … }` arrives as name `.card` and value `h1`).
        let mut selector = node.name.clone();
        for value in &node.values {
            selector.push(' ');
            selector.push_str(value.kind.text());
        }

        let mut declarations = Vec::new();
        let mut nested = Vec::new();
        for child in node.children.as_deref().unwrap_or(&[]) {
            match child {
                RawItem::Node(decl) if decl.children.is_none() => {
                    declarations.push(StyleDeclaration {
                        property: decl.name.clone(),
                        values: decl
                            .values
                            .iter()
                            .map(|v| v.kind.text().to_string())
                            .collect(),
                    });
                }
                RawItem::Node(_) => {
                    nested.extend(style_rules(std::slice::from_ref(child))?);
                }
                RawItem::Comment(_) | RawItem::Schema(_) => {}
                RawItem::Text(text) => {
                    return Err(HudlError::transform(
                        "style declarations contain words, not strings",
                        text.span,
                    ))
                }
            }
        }

        rules.push(StyleRule { selector, declarations, nested });
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn transform(source: &str) -> TransformOutput {
        let raw = parse_source(source).unwrap();
        let schema = crate::schema::parse_schema_blocks(raw.schema_blocks()).unwrap();
        transform_document(&raw, &schema, "doc").unwrap()
    }

    fn transform_err(source: &str) -> HudlError {
        let raw = parse_source(source).unwrap();
        let schema = Schema::default();
        transform_document(&raw, &schema, "doc").unwrap_err()
    }

    fn first_root(out: &TransformOutput) -> &Node {
        &out.components[0].roots[0]
    }

    #[test]
    fn selector_shorthand_expands() {
        let out = transform("el { .card { h1#title.big \"Hi\" } }");
        match first_root(&out) {
            Node::Element(card) => {
                assert_eq!(card.tag, "div");
                assert_eq!(card.classes, vec!["card".to_string()]);
                match &card.children[0] {
                    Node::Element(h1) => {
                        assert_eq!(h1.tag, "h1");
                        assert_eq!(h1.id.as_deref(), Some("title"));
                        assert_eq!(h1.classes, vec!["big".to_string()]);
                    }
                    other => panic!("expected h1, got {other:?}"),
                }
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_id_in_selector_errors() {
        let err = transform_err("el { div#a#b { } }");
        assert!(err.to_string().contains("duplicate id"));
    }

    #[test]
    fn metadata_names_components() {
        let out = transform("// name: Layout\n// data: D\n/** message D { string x = 1; } */\nel { p \"hi\" }");
        assert_eq!(out.components[0].name, "Layout");
        assert_eq!(out.components[0].data_type.as_deref(), Some("D"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn missing_data_type_is_a_diagnostic() {
        let raw = parse_source("// data: Missing\nel { p \"hi\" }").unwrap();
        let out = transform_document(&raw, &Schema::default(), "doc").unwrap();
        assert_eq!(out.components.len(), 1);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn unnamed_component_uses_document_name() {
        let out = transform("el { p \"hi\" }");
        assert_eq!(out.components[0].name, "doc");
    }

    #[test]
    fn if_else_pairing() {
        let out = transform("el { if `ok` { p \"y\" } else { p \"n\" } }");
        match first_root(&out) {
            Node::If { condition, else_children, .. } => {
                assert_eq!(condition.source, "ok");
                assert!(else_children.is_some());
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn orphan_else_errors() {
        let err = transform_err("el { else { p \"n\" } }");
        assert!(err.to_string().contains("else without a matching if"));
    }

    #[test]
    fn switch_with_cases_and_default() {
        let out = transform(
            "el { switch `status` { case S_ACTIVE { span \"A\" } case \"x\" { span \"X\" } case `_ > 3` { span \"N\" } default { span \"?\" } } }",
        );
        match first_root(&out) {
            Node::Switch { cases, default_children, .. } => {
                assert_eq!(cases.len(), 3);
                assert!(matches!(&cases[0].pattern, CasePattern::EnumSymbol(s) if s == "S_ACTIVE"));
                assert!(matches!(&cases[1].pattern, CasePattern::StringLit(s) if s == "x"));
                assert!(matches!(&cases[2].pattern, CasePattern::Expr(_)));
                assert!(default_children.is_some());
            }
            other => panic!("expected switch, got {other:?}"),
        }
    }

    #[test]
    fn case_outside_switch_errors() {
        let err = transform_err("el { case X { } }");
        assert!(err.to_string().contains("only allowed inside a switch"));
    }

    #[test]
    fn each_requires_binding() {
        let out = transform("el { each item `items` { p `item` } }");
        match first_root(&out) {
            Node::Each { binding, iterable, .. } => {
                assert_eq!(binding, "item");
                assert_eq!(iterable.source, "items");
            }
            other => panic!("expected each, got {other:?}"),
        }
        let err = transform_err("el { each `items` { } }");
        assert!(err.to_string().contains("loop binding"));
    }

    #[test]
    fn slot_marker_and_component_calls() {
        let out = transform("// name: Layout\nel { main { #content } }\n// name: Home\nel { Layout { p \"hi\" } }");
        match &out.components[0].roots[0] {
            Node::Element(main) => assert!(matches!(main.children[0], Node::Slot { .. })),
            other => panic!("expected main element, got {other:?}"),
        }
        match &out.components[1].roots[0] {
            Node::ComponentCall { name, children, .. } => {
                assert_eq!(name, "Layout");
                assert_eq!(children.len(), 1);
            }
            other => panic!("expected component call, got {other:?}"),
        }
    }

    #[test]
    fn two_slots_error() {
        let err = transform_err("el { main { #content }\nfooter { #content } }");
        assert!(err.to_string().contains("slot markers"));
    }

    #[test]
    fn other_hash_selectors_are_divs() {
        let out = transform("el { #sidebar { p \"hi\" } }");
        match first_root(&out) {
            Node::Element(el) => {
                assert_eq!(el.tag, "div");
                assert_eq!(el.id.as_deref(), Some("sidebar"));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn text_interpolation_splits() {
        let out = transform("el { p \"Hello, `name`!\" }");
        match first_root(&out) {
            Node::Element(p) => match &p.children[0] {
                Node::Text { segments, .. } => {
                    assert_eq!(segments.len(), 3);
                    assert!(matches!(&segments[0], TextSegment::Literal(s) if s == "Hello, "));
                    assert!(matches!(&segments[1], TextSegment::Expr(e) if e.source == "name"));
                    assert!(matches!(&segments[2], TextSegment::Literal(s) if s == "!"));
                }
                other => panic!("expected text, got {other:?}"),
            },
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn inline_reactive_props_lower() {
        let out = transform("el { input ~on:keyup~debounce:500ms=`$filter = value` }");
        match first_root(&out) {
            Node::Element(input) => {
                let attr = &input.reactive[0];
                assert!(matches!(&attr.kind, ReactiveKind::On { event } if event == "keyup"));
                assert_eq!(attr.modifiers[0].name, "debounce");
                assert_eq!(attr.modifiers[0].value.as_deref(), Some("500ms"));
                assert_eq!(attr.value.as_deref(), Some("$filter = value"));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn reactive_block_chunks_inline_specs() {
        let out = transform("el { button { ~ { on:click \"@post('/x')\" .warn $isWarn } \"Go\" } }");
        match first_root(&out) {
            Node::Element(button) => {
                assert_eq!(button.reactive.len(), 2);
                assert!(
                    matches!(&button.reactive[0].kind, ReactiveKind::On { event } if event == "click")
                );
                assert_eq!(button.reactive[0].value.as_deref(), Some("@post('/x')"));
                assert!(
                    matches!(&button.reactive[1].kind, ReactiveKind::Class { name } if name == "warn")
                );
                assert_eq!(button.reactive[1].value.as_deref(), Some("$isWarn"));
                // The block itself is not a child node.
                assert_eq!(button.children.len(), 1);
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn let_signals_classify() {
        let out = transform("el { div { ~ { let:count 5; let:total \"$count * 2\" } } }");
        match first_root(&out) {
            Node::Element(div) => {
                assert!(matches!(
                    &div.reactive[0].kind,
                    ReactiveKind::Let { name, computed: false } if name == "count"
                ));
                assert!(matches!(
                    &div.reactive[1].kind,
                    ReactiveKind::Let { name, computed: true } if name == "total"
                ));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn bind_shorthand_lowers() {
        let out = transform("el { input~>query }");
        match first_root(&out) {
            Node::Element(input) => {
                assert_eq!(input.tag, "input");
                assert!(matches!(input.reactive[0].kind, ReactiveKind::Bind));
                assert_eq!(input.reactive[0].value.as_deref(), Some("query"));
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn imports_collect() {
        let out = transform("import { \"shared.hudl\"; \"nav.hudl\" }\nel { p \"hi\" }");
        assert_eq!(out.imports, vec!["shared.hudl".to_string(), "nav.hudl".to_string()]);
    }

    #[test]
    fn special_links_lower_to_link() {
        let out = transform("el { head { _stylesheet \"/app.css\" } }");
        match first_root(&out) {
            Node::Element(head) => match &head.children[0] {
                Node::Element(link) => {
                    assert_eq!(link.tag, "link");
                    assert!(matches!(
                        link.attrs.get("rel"),
                        Some(AttrValue::Static(rel)) if rel == "stylesheet"
                    ));
                    assert!(matches!(
                        link.attrs.get("href"),
                        Some(AttrValue::Static(href)) if href == "/app.css"
                    ));
                    assert!(link.self_closing);
                }
                other => panic!("expected link, got {other:?}"),
            },
            other => panic!("expected head, got {other:?}"),
        }
    }

    #[test]
    fn style_blocks_build_rules() {
        let out = transform("el { .card { style { .title { padding 10px 2em; color red } } } }");
        match first_root(&out) {
            Node::Element(card) => match &card.children[0] {
                Node::Style(style) => {
                    assert_eq!(style.rules.len(), 1);
                    let rule = &style.rules[0];
                    assert_eq!(rule.selector, ".title");
                    assert_eq!(rule.declarations[0].property, "padding");
                    assert_eq!(rule.declarations[0].values, vec!["_10px", "_2em"]);
                    assert_eq!(rule.declarations[1].property, "color");
                }
                other => panic!("expected style, got {other:?}"),
            },
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_attribute_errors() {
        let err = transform_err("el { a href=\"/x\" href=\"/y\" }");
        assert!(err.to_string().contains("duplicate attribute"));
    }
}
