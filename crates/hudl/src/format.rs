// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Canonical source formatter.
//!
//! The formatter reprints the raw node tree with normalized whitespace and
//! the surface sugar restored:
//!
//! - `tag class="foo"` collapses to `tag.foo`
//! - a bare selector (`div.card`, `div#x`) drops the inferred `div`
//! - `link rel="stylesheet" href=…` normalizes to `_stylesheet …`
//! - adjacent `~` blocks merge into one, positioned as the first child
//! - backtick expressions and numeric-prefixed words print in sugar form
//!
//! Formatting is idempotent: `fmt(fmt(s)) == fmt(s)` for well-formed input.

use crate::ast::{RawDocument, RawItem, RawNode, RawProp, RawValue, RawValueKind};
use crate::error::Result;
use crate::parser::parse_source;

/// Formats hudl source into canonical form.
pub fn format_source(source: &str) -> Result<String> {
    let document = parse_source(source)?;
    Ok(print_document(&document))
}

fn print_document(document: &RawDocument) -> String {
    let mut out = String::new();
    print_items(&mut out, &document.items, 0);
    out
}

fn print_items(out: &mut String, items: &[RawItem], depth: usize) {
    let mut previous_was_if = false;
    for item in items {
        match item {
            RawItem::Node(node) if node.name == "else" && previous_was_if => {
                // Reattach `else` to the closing brace of its `if`.
                while out.ends_with('\n') {
                    out.pop();
                }
                out.push(' ');
                print_node(out, node, depth, true);
                previous_was_if = false;
                continue;
            }
            _ => {}
        }

        previous_was_if = false;
        match item {
            RawItem::Node(node) => {
                print_node(out, node, depth, false);
                previous_was_if = node.name == "if" && node.children.is_some();
            }
            RawItem::Text(text) => {
                indent(out, depth);
                out.push_str(&print_value_kind(&text.value));
                out.push('\n');
            }
            RawItem::Comment(comment) => {
                indent(out, depth);
                if comment.block {
                    out.push_str(&format!("/* {} */", comment.text));
                } else {
                    out.push_str(&format!("// {}", comment.text));
                }
                out.push('\n');
            }
            RawItem::Schema(block) => {
                indent(out, depth);
                out.push_str("/**\n");
                for line in block.text.lines().filter(|line| !line.trim().is_empty()) {
                    indent(out, depth);
                    out.push_str(&format!(" * {line}\n"));
                }
                indent(out, depth);
                out.push_str(" */\n");
            }
        }
    }
}

fn print_node(out: &mut String, node: &RawNode, depth: usize, continuation: bool) {
    let node = canonicalize(node);

    if !continuation {
        indent(out, depth);
    }
    out.push_str(&node.name);

    for value in &node.values {
        out.push(' ');
        out.push_str(&print_value(value));
    }
    for prop in &node.props {
        out.push(' ');
        out.push_str(&prop.name);
        out.push('=');
        out.push_str(&print_value(&prop.value));
    }

    match &node.children {
        None => out.push('\n'),
        Some(children) if children.is_empty() => out.push_str(" {}\n"),
        Some(children) => {
            out.push_str(" {\n");
            print_items(out, children, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
    }
}

/// Applies the canonicalization rules to one node.
fn canonicalize(node: &RawNode) -> RawNode {
    let mut node = node.clone();

    // `link rel="x"` normalizes to the `_x` special-link form, with the
    // href (if any) as the first positional value.
    if node.name == "link" {
        let rel = node.props.iter().position(|p| {
            p.name == "rel"
                && matches!(&p.value.kind, RawValueKind::Str(v)
                    if !v.is_empty() && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        });
        if let Some(rel_idx) = rel {
            let rel_prop = node.props.remove(rel_idx);
            node.name = format!("_{}", rel_prop.value.kind.text());
            if let Some(href_idx) = node.props.iter().position(|p| p.name == "href") {
                let href = node.props.remove(href_idx);
                node.values.insert(0, href.value);
            }
        }
    }

    // Static `class` properties collapse into the selector.
    let mut kept_props: Vec<RawProp> = Vec::new();
    for prop in node.props.drain(..) {
        if prop.name == "class" {
            if let RawValueKind::Str(classes) = &prop.value.kind {
                for class in classes.split_whitespace() {
                    node.name.push('.');
                    node.name.push_str(class);
                }
                continue;
            }
        }
        kept_props.push(prop);
    }
    node.props = kept_props;

    // A selector-only node drops the inferred `div`.
    if let Some(rest) = node.name.strip_prefix("div") {
        if rest.starts_with('.') || rest.starts_with('#') {
            node.name = rest.to_string();
        }
    }

    // All `~` blocks merge into one, positioned first.
    if let Some(children) = node.children.take() {
        let mut reactive: Vec<RawItem> = Vec::new();
        let mut rest: Vec<RawItem> = Vec::new();
        let mut tilde: Option<RawNode> = None;
        for child in children {
            match child {
                RawItem::Node(block) if block.name == "~" => {
                    let merged = tilde.get_or_insert_with(|| RawNode {
                        name: "~".to_string(),
                        values: Vec::new(),
                        props: Vec::new(),
                        children: Some(Vec::new()),
                        span: block.span,
                    });
                    if let (Some(into), Some(from)) = (&mut merged.children, block.children) {
                        into.extend(from);
                    }
                }
                other => rest.push(other),
            }
        }
        if let Some(tilde) = tilde {
            reactive.push(RawItem::Node(tilde));
        }
        reactive.extend(rest);
        node.children = Some(reactive);
    }

    node
}

fn print_value(value: &RawValue) -> String {
    print_value_kind(&value.kind)
}

fn print_value_kind(kind: &RawValueKind) -> String {
    match kind {
        RawValueKind::Str(text) => {
            let escaped = text
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n")
                .replace('\t', "\\t");
            format!("\"{escaped}\"")
        }
        RawValueKind::Raw(text) => match kind.as_expression() {
            // Expressions print in backtick sugar form; the normalizer
            // re-wraps them on the next parse.
            Some(expr) => format!("`{expr}`"),
            None => {
                let mut hashes = 1;
                let mut run = 0;
                for ch in text.chars() {
                    match ch {
                        '"' => run = 1,
                        '#' if run > 0 => {
                            run += 1;
                            hashes = hashes.max(run);
                        }
                        _ => run = 0,
                    }
                }
                let marks = "#".repeat(hashes);
                format!("r{marks}\"{text}\"{marks}")
            }
        },
        RawValueKind::Word(word) => strip_shim(word),
    }
}

fn strip_shim(word: &str) -> String {
    match word.strip_prefix('_') {
        Some(rest) if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) => rest.to_string(),
        _ => word.to_string(),
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}
