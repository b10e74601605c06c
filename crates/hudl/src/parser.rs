// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Node parser: lifts normalized hudl source into a raw node tree.
//!
//! The grammar lives in `grammar/hudl.pest`. This module drives pest and
//! converts its pair tree into [`RawDocument`] values with lossless source
//! spans. Grammar violations surface as [`HudlError::SyntaxError`] with a
//! caret snippet attached.
//!
//! The parser expects *normalized* source (see [`crate::normalize`]);
//! [`parse_source`] runs the normalizer itself and is the entry point the
//! rest of the crate uses.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::{
    RawComment, RawDocument, RawItem, RawNode, RawProp, RawText, RawValue, RawValueKind,
    SchemaBlock, Span,
};
use crate::error::{HudlError, Result, SourceContext};
use crate::normalize::normalize;

/// Pest parser for the strict node grammar.
#[derive(Parser)]
#[grammar = "grammar/hudl.pest"]
pub struct HudlParser;

/// Normalizes and parses hudl source into a raw document.
pub fn parse_source(source: &str) -> Result<RawDocument> {
    let normalized = normalize(source);
    parse_normalized(&normalized)
}

/// Parses already-normalized source into a raw document.
pub fn parse_normalized(source: &str) -> Result<RawDocument> {
    let mut pairs = HudlParser::parse(Rule::document, source).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        HudlError::SyntaxError {
            message: e.variant.message().to_string(),
            line,
            column,
            file: None,
            source_context: Some(SourceContext::from_source(source, line, column)),
        }
    })?;

    let document = pairs.next().expect("document rule always present");
    let mut items = Vec::new();
    for pair in document.into_inner() {
        if pair.as_rule() == Rule::EOI {
            break;
        }
        items.push(build_item(pair));
    }
    Ok(RawDocument { items })
}

fn span_of(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    let (line, column) = span.start_pos().line_col();
    Span::new(span.start(), span.end(), line, column)
}

fn build_item(pair: Pair<Rule>) -> RawItem {
    let span = span_of(&pair);
    match pair.as_rule() {
        Rule::schema_comment => RawItem::Schema(SchemaBlock {
            text: schema_payload(pair.as_str()),
            span,
        }),
        Rule::block_comment => RawItem::Comment(RawComment {
            text: pair
                .as_str()
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim()
                .to_string(),
            block: true,
            span,
        }),
        Rule::line_comment => RawItem::Comment(RawComment {
            text: pair.as_str().trim_start_matches("//").trim().to_string(),
            block: false,
            span,
        }),
        Rule::string | Rule::raw_string => RawItem::Text(RawText {
            value: build_value_kind(&pair),
            span,
        }),
        Rule::node => RawItem::Node(build_node(pair)),
        rule => unreachable!("unexpected item rule {rule:?}"),
    }
}

fn build_node(pair: Pair<Rule>) -> RawNode {
    let span = span_of(&pair);
    let mut name = String::new();
    let mut values = Vec::new();
    let mut props = Vec::new();
    let mut children = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::node_name => name = inner.as_str().to_string(),
            Rule::prop => {
                let prop_span = span_of(&inner);
                let mut parts = inner.into_inner();
                let key = parts.next().expect("prop key");
                let value = parts.next().expect("prop value");
                props.push(RawProp {
                    name: key.as_str().to_string(),
                    value: RawValue {
                        kind: build_value_kind(&value),
                        span: span_of(&value),
                    },
                    span: prop_span,
                });
            }
            Rule::string | Rule::raw_string | Rule::bare => {
                values.push(RawValue {
                    kind: build_value_kind(&inner),
                    span: span_of(&inner),
                });
            }
            Rule::child_block => {
                children = Some(inner.into_inner().map(build_item).collect());
            }
            rule => unreachable!("unexpected node child {rule:?}"),
        }
    }

    RawNode { name, values, props, children, span }
}

fn build_value_kind(pair: &Pair<Rule>) -> RawValueKind {
    match pair.as_rule() {
        Rule::string => RawValueKind::Str(unescape(inner_of_string(pair.as_str()))),
        Rule::raw_string => RawValueKind::Raw(raw_string_content(pair.as_str()).to_string()),
        Rule::bare => RawValueKind::Word(pair.as_str().to_string()),
        rule => unreachable!("unexpected value rule {rule:?}"),
    }
}

fn inner_of_string(quoted: &str) -> &str {
    &quoted[1..quoted.len() - 1]
}

/// Strips `r#"` ... `"#` delimiters, leaving the content verbatim.
fn raw_string_content(raw: &str) -> &str {
    let hashes = raw[1..].bytes().take_while(|b| *b == b'#').count();
    &raw[1 + hashes + 1..raw.len() - 1 - hashes]
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

/// Strips the `/** */` delimiters and per-line `*` gutters from a schema
/// block, keeping the payload's own line structure.
fn schema_payload(comment: &str) -> String {
    let body = comment
        .trim_start_matches("/**")
        .trim_end_matches("*/");
    let mut out = String::with_capacity(body.len());
    for line in body.lines() {
        let trimmed = line.trim_start();
        let without_gutter = match trimmed.strip_prefix('*') {
            Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
            None => trimmed,
        };
        out.push_str(without_gutter);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_node(doc: &RawDocument) -> &RawNode {
        match doc.items.first() {
            Some(RawItem::Node(node)) => node,
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn parses_nested_selectors() {
        let doc = parse_source("el { .card { h1#title \"Hi\" } }").unwrap();
        let el = only_node(&doc);
        assert_eq!(el.name, "el");
        let children = el.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        match &children[0] {
            RawItem::Node(card) => {
                assert_eq!(card.name, ".card");
                match &card.children.as_ref().unwrap()[0] {
                    RawItem::Node(h1) => {
                        assert_eq!(h1.name, "h1#title");
                        assert_eq!(h1.values[0].kind, RawValueKind::Str("Hi".to_string()));
                    }
                    other => panic!("expected h1 node, got {other:?}"),
                }
            }
            other => panic!("expected .card node, got {other:?}"),
        }
    }

    #[test]
    fn parses_props_and_backtick_values() {
        let doc = parse_source("button disabled=`locked` type=\"submit\"").unwrap();
        let button = only_node(&doc);
        assert_eq!(button.props.len(), 2);
        assert_eq!(button.props[0].name, "disabled");
        assert_eq!(button.props[0].value.kind.as_expression(), Some("locked"));
        assert_eq!(
            button.props[1].value.kind,
            RawValueKind::Str("submit".to_string())
        );
    }

    #[test]
    fn parses_each_header() {
        let doc = parse_source("each item `items` { li \"x\" }").unwrap();
        let each = only_node(&doc);
        assert_eq!(each.name, "each");
        assert_eq!(each.values[0].kind, RawValueKind::Word("item".to_string()));
        assert_eq!(each.values[1].kind.as_expression(), Some("items"));
    }

    #[test]
    fn semicolons_separate_siblings() {
        let doc = parse_source("span \"A\"; span \"B\"").unwrap();
        assert_eq!(doc.items.len(), 2);
    }

    #[test]
    fn collects_schema_blocks_and_comments() {
        let source = "/**\n * message D { string name = 1; }\n */\n// name: Card\nel { p \"hi\" }\n";
        let doc = parse_source(source).unwrap();
        assert_eq!(doc.items.len(), 3);
        match &doc.items[0] {
            RawItem::Schema(block) => {
                assert!(block.text.contains("message D { string name = 1; }"));
            }
            other => panic!("expected schema block, got {other:?}"),
        }
        match &doc.items[1] {
            RawItem::Comment(comment) => assert_eq!(comment.text, "name: Card"),
            other => panic!("expected comment, got {other:?}"),
        }
    }

    #[test]
    fn trailing_comments_parse_as_items() {
        let doc = parse_source("p \"hi\" // note\nspan \"x\"\n").unwrap();
        assert_eq!(doc.items.len(), 3);
        assert!(matches!(&doc.items[0], RawItem::Node(n) if n.name == "p"));
        assert!(matches!(&doc.items[1], RawItem::Comment(c) if c.text == "note"));
        assert!(matches!(&doc.items[2], RawItem::Node(n) if n.name == "span"));
    }

    #[test]
    fn condensed_else_parses_as_sibling() {
        let doc = parse_source("if `ok` { p \"y\" } else { p \"n\" }").unwrap();
        assert_eq!(doc.items.len(), 2);
        assert!(matches!(&doc.items[1], RawItem::Node(n) if n.name == "else"));
    }

    #[test]
    fn string_items_inside_blocks() {
        let doc = parse_source("p { \"hello\"; `name` }").unwrap();
        let p = only_node(&doc);
        let children = p.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert!(matches!(&children[0], RawItem::Text(t) if t.value.text() == "hello"));
        match &children[1] {
            RawItem::Text(t) => assert_eq!(t.value.as_expression(), Some("name")),
            other => panic!("expected expression text, got {other:?}"),
        }
    }

    #[test]
    fn reports_syntax_errors_with_location() {
        let err = parse_source("el { p \"unterminated }").unwrap_err();
        match err {
            HudlError::SyntaxError { line, source_context, .. } => {
                assert_eq!(line, 1);
                assert!(source_context.is_some());
            }
            other => panic!("expected syntax error, got {other}"),
        }
    }

    #[test]
    fn numeric_prefixes_survive_as_words() {
        let doc = parse_source("padding 10px 1.5rem").unwrap();
        let node = only_node(&doc);
        assert_eq!(node.values[0].kind, RawValueKind::Word("_10px".to_string()));
        assert_eq!(node.values[1].kind, RawValueKind::Word("_1.5rem".to_string()));
    }
}
