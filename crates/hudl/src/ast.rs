// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree types for hudl templates.
//!
//! Two layers live here:
//!
//! - The **raw node tree** ([`RawDocument`], [`RawNode`]) produced by the
//!   parser. It is a faithful, lossless view of the strict node grammar:
//!   every node has a name, positional values, named properties, an optional
//!   child block and a source span. Comments and schema blocks are kept
//!   in-place so the formatter can reprint them.
//! - The **typed AST** ([`Component`], [`Node`]) produced by the transformer
//!   after selector expansion, metadata extraction, control-flow lifting and
//!   reactive-attribute lowering. This is what the interpreter walks.
//!
//! Component references are by name, never by pointer, so hot reload can
//! replace a document without touching its callers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Source location information for error reporting and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from the start of the source.
    pub start: usize,
    /// Byte offset of the end (exclusive).
    pub end: usize,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub column: usize,
}

impl Span {
    /// Creates a new source span.
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self { start, end, line, column }
    }
}

// ---------------------------------------------------------------------------
// Raw node tree
// ---------------------------------------------------------------------------

/// A parsed source document before transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Top-level items in source order.
    pub items: Vec<RawItem>,
}

impl RawDocument {
    /// All embedded schema blocks, in source order.
    pub fn schema_blocks(&self) -> impl Iterator<Item = &SchemaBlock> {
        self.items.iter().filter_map(|item| match item {
            RawItem::Schema(block) => Some(block),
            _ => None,
        })
    }
}

/// One item of a document or child block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawItem {
    /// A node with name, values, properties and children.
    Node(RawNode),
    /// A standalone string literal (text content, or an expression when the
    /// literal is a backtick-wrapped raw string).
    Text(RawText),
    /// A `//` or `/* */` comment.
    Comment(RawComment),
    /// A `/** */` block carrying an embedded schema payload.
    Schema(SchemaBlock),
}

impl RawItem {
    /// The source span of this item.
    pub fn span(&self) -> Span {
        match self {
            RawItem::Node(n) => n.span,
            RawItem::Text(t) => t.span,
            RawItem::Comment(c) => c.span,
            RawItem::Schema(s) => s.span,
        }
    }
}

/// A raw node: `name value* prop* { children }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    /// The node name, punctuation and all (selector sugar is resolved later).
    pub name: String,
    /// Positional values in source order.
    pub values: Vec<RawValue>,
    /// Named properties in source order.
    pub props: Vec<RawProp>,
    /// Child items, `None` when the node has no brace block.
    pub children: Option<Vec<RawItem>>,
    /// Source location of the node name.
    pub span: Span,
}

/// A standalone string literal item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    /// The literal value (cooked for normal strings, verbatim for raw ones).
    pub value: RawValueKind,
    /// Source location.
    pub span: Span,
}

/// A comment preserved for metadata extraction and formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    /// Comment text without the delimiters, trimmed.
    pub text: String,
    /// True for `/* */` comments, false for `//` comments.
    pub block: bool,
    /// Source location.
    pub span: Span,
}

/// An embedded `/** */` schema payload, delivered to the schema parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBlock {
    /// The payload with comment delimiters and `*` gutters stripped.
    pub text: String,
    /// Source location of the opening `/**`.
    pub span: Span,
}

/// A named property `key=value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProp {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: RawValue,
    /// Source location of the name.
    pub span: Span,
}

/// A positional or property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawValue {
    /// The value payload.
    pub kind: RawValueKind,
    /// Source location.
    pub span: Span,
}

/// The payload of a [`RawValue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValueKind {
    /// A cooked `"..."` string with escapes resolved.
    Str(String),
    /// A raw `r#"..."#` string, content verbatim. The normalizer wraps
    /// backtick expressions this way, so content starting and ending with a
    /// backtick denotes an expression.
    Raw(String),
    /// A bare word such as `$isWarn`, `S_ACTIVE` or `_10px`.
    Word(String),
}

impl RawValueKind {
    /// The textual content regardless of quoting form.
    pub fn text(&self) -> &str {
        match self {
            RawValueKind::Str(s) | RawValueKind::Raw(s) | RawValueKind::Word(s) => s,
        }
    }

    /// When the value is a backtick-wrapped expression, its inner source.
    pub fn as_expression(&self) -> Option<&str> {
        match self {
            RawValueKind::Raw(s) if s.len() >= 2 && s.starts_with('`') && s.ends_with('`') => {
                Some(&s[1..s.len() - 1])
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed AST
// ---------------------------------------------------------------------------

/// An embedded expression, kept as source text plus location.
///
/// Expression parsing happens in the expression engine; an unparseable
/// expression surfaces as a runtime evaluation error at render time rather
/// than failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// The expression source, without the backtick delimiters.
    pub source: String,
    /// Source location for error reporting.
    pub span: Span,
}

impl Expr {
    /// Creates a new expression from source text.
    pub fn new(source: impl Into<String>, span: Span) -> Self {
        Self { source: source.into(), span }
    }
}

/// A named, invocable template with an optional declared input message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// The component name, unique within a registry.
    pub name: String,
    /// Declared input message type (`// data: Type`), if any.
    pub data_type: Option<String>,
    /// The component's root nodes.
    pub roots: Vec<Node>,
    /// Source span of the component's defining element.
    pub span: Span,
}

impl Component {
    /// True when the component's first root element is `html`, which makes
    /// its render a full page rather than a fragment.
    pub fn is_page(&self) -> bool {
        matches!(
            self.roots.first(),
            Some(Node::Element(el)) if el.tag == "html"
        )
    }
}

/// A node of the typed AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// An HTML element.
    Element(Element),
    /// Text content: literal segments interleaved with expressions.
    Text {
        /// The segments in source order.
        segments: Vec<TextSegment>,
        /// Source location.
        span: Span,
    },
    /// A single expression producing a scalar or HTML value.
    Expression(Expr),
    /// `if cond { ... } else { ... }`.
    If {
        /// The condition expression.
        condition: Expr,
        /// Nodes rendered when the condition is truthy.
        then_children: Vec<Node>,
        /// Nodes rendered otherwise, when an `else` block is present.
        else_children: Option<Vec<Node>>,
        /// Source location of the `if` node.
        span: Span,
    },
    /// `switch subject { case ... default ... }`.
    Switch {
        /// The subject expression.
        subject: Expr,
        /// Cases in source order; first match wins.
        cases: Vec<SwitchCase>,
        /// Nodes rendered when no case matches.
        default_children: Option<Vec<Node>>,
        /// Source location of the `switch` node.
        span: Span,
    },
    /// `each binding iterable { ... }`.
    Each {
        /// Loop variable name.
        binding: String,
        /// Expression yielding the iterable.
        iterable: Expr,
        /// Nodes rendered per element.
        children: Vec<Node>,
        /// Source location of the `each` node.
        span: Span,
    },
    /// Invocation of another component.
    ComponentCall {
        /// Target component name, resolved through the import closure.
        name: String,
        /// Optional input expression evaluated in the caller's context.
        argument: Option<Expr>,
        /// Slot content rendered in the caller's context.
        children: Vec<Node>,
        /// Source location.
        span: Span,
    },
    /// The single child-insertion marker of a layout component.
    Slot {
        /// Source location.
        span: Span,
    },
    /// A scoped CSS block.
    Style(StyleBlock),
}

impl Node {
    /// The source span of this node.
    pub fn span(&self) -> Span {
        match self {
            Node::Element(el) => el.span,
            Node::Text { span, .. } => *span,
            Node::Expression(expr) => expr.span,
            Node::If { span, .. } => *span,
            Node::Switch { span, .. } => *span,
            Node::Each { span, .. } => *span,
            Node::ComponentCall { span, .. } => *span,
            Node::Slot { span } => *span,
            Node::Style(style) => style.span,
        }
    }
}

/// One segment of a text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextSegment {
    /// A literal run, HTML-escaped on output.
    Literal(String),
    /// An embedded expression.
    Expr(Expr),
}

/// An HTML element with resolved selector shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name.
    pub tag: String,
    /// `id` from selector shorthand or an explicit property.
    pub id: Option<String>,
    /// Class list from selector shorthand and `class` properties.
    pub classes: Vec<String>,
    /// Remaining attributes in insertion order.
    pub attrs: IndexMap<String, AttrValue>,
    /// Lowered reactive attributes in source order.
    pub reactive: Vec<ReactiveAttr>,
    /// Child nodes.
    pub children: Vec<Node>,
    /// True for elements written with no child block.
    pub self_closing: bool,
    /// Source location.
    pub span: Span,
}

/// The value of a regular (non-reactive) attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// A static string, emitted escaped.
    Static(String),
    /// An expression evaluated at render time.
    Expr(Expr),
}

/// One `case` of a switch node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// The pattern to match the subject against.
    pub pattern: CasePattern,
    /// Nodes rendered when the pattern matches.
    pub children: Vec<Node>,
    /// Source location of the `case` node.
    pub span: Span,
}

/// A case pattern, resolved against the subject at interpret time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CasePattern {
    /// A bare identifier matched as an enum symbol.
    EnumSymbol(String),
    /// A string literal matched by equality.
    StringLit(String),
    /// An expression evaluated with the subject bound as receiver.
    Expr(Expr),
}

/// A reactive attribute lowered from `~` sugar.
///
/// The interpreter maps these to `data-*` output attributes; the core never
/// executes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactiveAttr {
    /// The structured attribute kind.
    pub kind: ReactiveKind,
    /// Modifiers appended as `__name.value` suffixes.
    pub modifiers: Vec<ReactiveModifier>,
    /// The client-side value, emitted verbatim (attribute-escaped).
    pub value: Option<String>,
    /// Source location.
    pub span: Span,
}

/// The kind (and subkeys) of a reactive attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReactiveKind {
    /// Two-way binding to a signal: `data-bind`.
    Bind,
    /// Signal declaration: `data-signals-<name>` or `data-computed-<name>`.
    Let {
        /// Signal name.
        name: String,
        /// True when the value contains operators or calls.
        computed: bool,
    },
    /// Event handler: `data-on-<event>` or `data-on:<event>`.
    On {
        /// Event name.
        event: String,
    },
    /// Visibility toggle: `data-show`.
    Show,
    /// Text binding: `data-text`.
    Text,
    /// Conditional class: `data-class-<name>`.
    Class {
        /// Class name.
        name: String,
    },
    /// Plain HTML attribute binding: `data-attr-<name>`.
    Attr {
        /// Attribute name.
        name: String,
    },
    /// Signal persistence: `data-persist`.
    Persist,
    /// Element reference: `data-ref`.
    Ref,
    /// Teleport target selector: `data-teleport`.
    Teleport,
    /// Scroll-into-view marker: `data-scroll-into-view`.
    ScrollIntoView,
}

/// A `~modifier[:value]` suffix on a reactive attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactiveModifier {
    /// Modifier name.
    pub name: String,
    /// Optional modifier value.
    pub value: Option<String>,
}

/// A scoped CSS block attached to an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleBlock {
    /// The rules in source order.
    pub rules: Vec<StyleRule>,
    /// Source span, also the input of the stable scope-class hash.
    pub span: Span,
}

/// One CSS rule: a selector with declarations and nested rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    /// The selector as written.
    pub selector: String,
    /// Declarations in source order. Values keep the parser's underscore
    /// shim on numeric-prefixed tokens; the serializer strips it.
    pub declarations: Vec<StyleDeclaration>,
    /// Nested rules.
    pub nested: Vec<StyleRule>,
}

/// A single CSS declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDeclaration {
    /// Property name.
    pub property: String,
    /// Value tokens, space-joined on output.
    pub values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_value_detection() {
        let raw = RawValueKind::Raw("`user.name`".to_string());
        assert_eq!(raw.as_expression(), Some("user.name"));

        let plain = RawValueKind::Raw("just raw".to_string());
        assert_eq!(plain.as_expression(), None);

        let cooked = RawValueKind::Str("`not an expr`".to_string());
        assert_eq!(cooked.as_expression(), None);
    }

    #[test]
    fn page_detection() {
        let page = Component {
            name: "Layout".to_string(),
            data_type: None,
            roots: vec![Node::Element(Element {
                tag: "html".to_string(),
                id: None,
                classes: vec![],
                attrs: IndexMap::new(),
                reactive: vec![],
                children: vec![],
                self_closing: false,
                span: Span::default(),
            })],
            span: Span::default(),
        };
        assert!(page.is_page());

        let fragment = Component { roots: vec![], ..page };
        assert!(!fragment.is_page());
    }
}
