// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Scoped CSS serialization.
//!
//! A style block gets a scope class that is stable per source span, so hot
//! reloads of unrelated edits do not churn class names. Selectors are
//! rewritten to descend from the scope class, and the parser's underscore
//! shim on numeric-prefixed tokens (`_10px`) is stripped from property
//! values on the way out.

use sha2::{Digest, Sha256};

use crate::ast::{Span, StyleBlock, StyleRule};

/// The stable scope class for a style block: `h-` plus a short hash of the
/// owning document and the block's span.
pub fn scope_class(document: &str, span: Span) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.as_bytes());
    hasher.update(span.start.to_le_bytes());
    hasher.update(span.end.to_le_bytes());
    let digest = hasher.finalize();
    let mut short = String::with_capacity(10);
    for byte in &digest[..4] {
        short.push_str(&format!("{byte:02x}"));
    }
    format!("h-{short}")
}

/// Serializes a style block into the inner text of a `<style>` element,
/// prefixing every selector with the scope class. An empty scope (a block
/// with no enclosing element) serializes the selectors as written.
pub fn serialize(block: &StyleBlock, scope: &str) -> String {
    let mut out = String::new();
    let prefix = if scope.is_empty() {
        String::new()
    } else {
        format!(".{scope}")
    };
    for rule in &block.rules {
        write_rule(&mut out, rule, &prefix);
    }
    out
}

fn write_rule(out: &mut String, rule: &StyleRule, parent: &str) {
    let selector = if parent.is_empty() {
        rule.selector.clone()
    } else {
        format!("{parent} {}", rule.selector)
    };

    if !rule.declarations.is_empty() {
        out.push_str(&selector);
        out.push('{');
        for (i, decl) in rule.declarations.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            out.push_str(&decl.property);
            out.push(':');
            let values: Vec<String> = decl.values.iter().map(|v| strip_shim(v)).collect();
            out.push_str(&values.join(" "));
        }
        out.push('}');
    }

    for nested in &rule.nested {
        write_rule(out, nested, &selector);
    }
}

/// Strips the normalizer's underscore from `_10px`-style value tokens. The
/// original literal is restored exactly; words that legitimately start with
/// an underscore (no digit following) are untouched.
fn strip_shim(token: &str) -> String {
    match token.strip_prefix('_') {
        Some(rest) if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) => rest.to_string(),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StyleDeclaration;

    fn block() -> StyleBlock {
        StyleBlock {
            rules: vec![StyleRule {
                selector: ".title".to_string(),
                declarations: vec![
                    StyleDeclaration {
                        property: "padding".to_string(),
                        values: vec!["_10px".to_string(), "_2em".to_string()],
                    },
                    StyleDeclaration {
                        property: "color".to_string(),
                        values: vec!["red".to_string()],
                    },
                ],
                nested: vec![StyleRule {
                    selector: "a:hover".to_string(),
                    declarations: vec![StyleDeclaration {
                        property: "color".to_string(),
                        values: vec!["blue".to_string()],
                    }],
                    nested: vec![],
                }],
            }],
            span: Span::new(10, 60, 2, 3),
        }
    }

    #[test]
    fn scope_class_is_stable() {
        let a = scope_class("cards", Span::new(10, 60, 2, 3));
        let b = scope_class("cards", Span::new(10, 60, 2, 3));
        assert_eq!(a, b);
        assert!(a.starts_with("h-"));
        assert_eq!(a.len(), 10);

        let other_span = scope_class("cards", Span::new(11, 60, 2, 4));
        assert_ne!(a, other_span);
        let other_doc = scope_class("posts", Span::new(10, 60, 2, 3));
        assert_ne!(a, other_doc);
    }

    #[test]
    fn serializes_with_scope_prefix_and_unshimmed_values() {
        let css = serialize(&block(), "h-abcd1234");
        assert_eq!(
            css,
            ".h-abcd1234 .title{padding:10px 2em;color:red}.h-abcd1234 .title a:hover{color:blue}"
        );
    }
}
