// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Sugar normalizer: rewrites hudl source into strictly-grammatical form.
//!
//! Three rewrites run, in order, on code regions only (string literals,
//! comments and schema blocks pass through untouched):
//!
//! 1. **Numeric-prefix fixup** - `10px` becomes `_10px` so CSS-like literals
//!    survive the identifier grammar. The interpreter strips the underscore
//!    again when serializing CSS values.
//! 2. **Condensed else** - `} else` becomes `}` newline `else`, so the node
//!    grammar sees `else` as a fresh sibling node.
//! 3. **Backtick wrapping** - unquoted `` `expr` `` values are wrapped in raw
//!    string delimiters with enough `#` marks to survive embedded quotes.
//!
//! The normalizer never fails and each rule is idempotent; unparseable
//! residue is reported downstream by the node parser.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMERIC_PREFIX: Regex =
        Regex::new(r"(?P<b>^|[\s{};=,:(])(?P<n>[0-9]+(?:\.[0-9]+)?)(?P<s>[A-Za-z%][A-Za-z0-9%]*)")
            .unwrap();
    static ref CONDENSED_ELSE: Regex = Regex::new(r"\}[ \t]*else\b").unwrap();
}

/// Rewrites raw hudl source into strict node-grammar form.
pub fn normalize(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len() + source.len() / 8);
    let mut code = String::new();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &source[i..];

        if rest.starts_with("//") {
            flush_code(&mut out, &mut code);
            let end = rest.find('\n').map(|p| i + p).unwrap_or(bytes.len());
            out.push_str(&source[i..end]);
            i = end;
        } else if rest.starts_with("/*") {
            flush_code(&mut out, &mut code);
            let end = rest.find("*/").map(|p| i + p + 2).unwrap_or(bytes.len());
            out.push_str(&source[i..end]);
            i = end;
        } else if rest.starts_with('"') {
            flush_code(&mut out, &mut code);
            let end = cooked_string_end(source, i);
            out.push_str(&source[i..end]);
            i = end;
        } else if let Some(end) = raw_string_end(source, i, &mut out, &mut code) {
            i = end;
        } else if rest.starts_with('`') {
            flush_code(&mut out, &mut code);
            match rest[1..].find('`') {
                Some(close) => {
                    let inner = &rest[..close + 2];
                    out.push_str(&wrap_raw(inner));
                    i += close + 2;
                }
                None => {
                    // Unterminated backtick: pass through for the parser to report.
                    out.push_str(rest);
                    i = bytes.len();
                }
            }
        } else {
            let ch = rest.chars().next().unwrap();
            code.push(ch);
            i += ch.len_utf8();
        }
    }

    flush_code(&mut out, &mut code);
    out
}

/// Applies the code-region rules and appends the result.
fn flush_code(out: &mut String, code: &mut String) {
    if code.is_empty() {
        return;
    }
    let fixed = CONDENSED_ELSE.replace_all(code, "}\nelse");
    let fixed = NUMERIC_PREFIX.replace_all(&fixed, "${b}_${n}${s}");
    out.push_str(&fixed);
    code.clear();
}

/// Byte offset just past a `"..."` literal starting at `start`.
fn cooked_string_end(source: &str, start: usize) -> usize {
    let bytes = source.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Detects an `r#"..."#` literal at `start` and copies it verbatim.
///
/// Returns the offset past the literal, or `None` when `start` is not a raw
/// string opener (the `r` of an ordinary word does not count).
fn raw_string_end(
    source: &str,
    start: usize,
    out: &mut String,
    code: &mut String,
) -> Option<usize> {
    let bytes = source.as_bytes();
    if bytes[start] != b'r' {
        return None;
    }
    if start > 0 {
        let prev = bytes[start - 1];
        if prev.is_ascii_alphanumeric() || prev == b'_' {
            return None;
        }
    }
    let mut hashes = 0;
    let mut i = start + 1;
    while i < bytes.len() && bytes[i] == b'#' {
        hashes += 1;
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'"' {
        return None;
    }
    let closer = format!("\"{}", "#".repeat(hashes));
    let end = source[i + 1..]
        .find(&closer)
        .map(|p| i + 1 + p + closer.len())
        .unwrap_or(bytes.len());
    flush_code(out, code);
    out.push_str(&source[start..end]);
    Some(end)
}

/// Wraps a backtick-delimited expression in raw string delimiters, choosing
/// enough `#` marks to survive any `"#` runs in the content.
fn wrap_raw(backticked: &str) -> String {
    let mut needed = 1;
    let bytes = backticked.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            let mut run = 0;
            while i + 1 + run < bytes.len() && bytes[i + 1 + run] == b'#' {
                run += 1;
            }
            needed = needed.max(run + 1);
            i += run + 1;
        } else {
            i += 1;
        }
    }
    let hashes = "#".repeat(needed);
    format!("r{hashes}\"{backticked}\"{hashes}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_prefix_fixup() {
        assert_eq!(normalize("padding 10px"), "padding _10px");
        assert_eq!(normalize("margin 1.2rem 0%"), "margin _1.2rem _0%");
        assert_eq!(normalize("width=10px"), "width=_10px");
    }

    #[test]
    fn numeric_prefix_is_idempotent() {
        let once = normalize("padding 10px 2em");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn numeric_prefix_skips_strings_and_comments() {
        assert_eq!(normalize(r#"p "10px tall""#), r#"p "10px tall""#);
        assert_eq!(normalize("// 10px note"), "// 10px note");
        assert_eq!(normalize("/* 10px */"), "/* 10px */");
    }

    #[test]
    fn condensed_else_is_split() {
        assert_eq!(normalize("} else {"), "}\nelse {");
        assert_eq!(normalize("}   else {"), "}\nelse {");
        // Already split input is untouched.
        assert_eq!(normalize("}\nelse {"), "}\nelse {");
    }

    #[test]
    fn backticks_are_wrapped() {
        assert_eq!(normalize("href=`url`"), "href=r#\"`url`\"#");
        assert_eq!(normalize("if `a > b` {"), "if r#\"`a > b`\"# {");
    }

    #[test]
    fn backtick_wrapping_survives_embedded_quotes() {
        let out = normalize(r#"title=`m["k"]`"#);
        assert_eq!(out, "title=r#\"`m[\"k\"]`\"#");
        // A quote-hash run inside forces a wider delimiter.
        let tricky = normalize(r##"x=`a"#b`"##);
        assert_eq!(tricky, "x=r##\"`a\"#b`\"##");
    }

    #[test]
    fn backticks_inside_strings_survive() {
        let src = r#"p "Hello, `name`!""#;
        assert_eq!(normalize(src), src);
    }

    #[test]
    fn unterminated_backtick_passes_through() {
        assert_eq!(normalize("x=`oops"), "x=`oops");
    }

    #[test]
    fn raw_strings_pass_through() {
        let src = "x=r#\"`kept`\"#";
        assert_eq!(normalize(src), src);
        // 'r' inside a word is not a raw string opener.
        assert_eq!(normalize("color red"), "color red");
    }
}
