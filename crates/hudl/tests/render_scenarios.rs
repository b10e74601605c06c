// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! End-to-end render tests: source text in, wire bytes in, HTML out.

use std::time::Duration;

use hudl::{decode_message, parse_document, DocumentSet, HudlError, Renderer, Value};

/// Minimal wire encoder for test fixtures.
mod wire {
    pub fn varint(mut n: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (n & 0x7f) as u8;
            n >>= 7;
            if n == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    pub fn string_field(tag: u32, value: &str, out: &mut Vec<u8>) {
        varint(u64::from(tag) << 3 | 2, out);
        varint(value.len() as u64, out);
        out.extend_from_slice(value.as_bytes());
    }

    pub fn varint_field(tag: u32, value: u64, out: &mut Vec<u8>) {
        varint(u64::from(tag) << 3, out);
        varint(value, out);
    }
}

fn set_of(sources: &[(&str, &str)]) -> DocumentSet {
    let mut set = DocumentSet::new();
    for (name, source) in sources {
        set.insert_unlinked(parse_document(source, name).unwrap());
    }
    set.link_all();
    set
}

fn render(set: &DocumentSet, component: &str, input: Value) -> String {
    let rendered = Renderer::new(set).render(component, input).unwrap();
    assert!(
        rendered.errors.is_empty(),
        "unexpected eval errors: {:?}",
        rendered.errors
    );
    rendered.html
}

fn decode(set: &DocumentSet, doc: &str, message: &str, bytes: &[u8]) -> Value {
    let schema = &set.document(doc).unwrap().schema;
    decode_message(bytes, message, schema).unwrap()
}

#[test]
fn s1_selector_shorthand_and_static_text() {
    let set = set_of(&[("T1", "el { .card { h1#title \"Hi\" } }")]);
    assert_eq!(
        render(&set, "T1", Value::Null),
        "<div class=\"card\"><h1 id=\"title\">Hi</h1></div>"
    );
}

#[test]
fn s2_interpolation_escapes() {
    let set = set_of(&[(
        "T2",
        "/** message D { string name = 1; } */\n// data: D\nel { p \"Hello, `name`!\" }",
    )]);
    let mut bytes = Vec::new();
    wire::string_field(1, "<x>", &mut bytes);
    let input = decode(&set, "T2", "D", &bytes);
    assert_eq!(render(&set, "T2", input), "<p>Hello, &lt;x&gt;!</p>");
}

#[test]
fn s3_each_with_index() {
    let set = set_of(&[(
        "T3",
        "/** message D { repeated string items = 1; } */\n// data: D\nel { ul { each item `items` { li \"`_index + 1`. `item`\" } } }",
    )]);
    let mut bytes = Vec::new();
    wire::string_field(1, "a", &mut bytes);
    wire::string_field(1, "b", &mut bytes);
    let input = decode(&set, "T3", "D", &bytes);
    assert_eq!(
        render(&set, "T3", input),
        "<ul><li>1. a</li><li>2. b</li></ul>"
    );
}

#[test]
fn s4_switch_with_enum_and_default() {
    let source = "/** enum S { S_ACTIVE = 0; S_PENDING = 1; } message D { S status = 1; } */\n\
// data: D\n\
el { switch `status` { case S_ACTIVE { span \"A\" } case S_PENDING { span \"P\" } default { span \"?\" } } }";
    let set = set_of(&[("T4", source)]);

    let mut bytes = Vec::new();
    wire::varint_field(1, 1, &mut bytes);
    let input = decode(&set, "T4", "D", &bytes);
    assert_eq!(render(&set, "T4", input), "<span>P</span>");

    // Zero (default entry, absent on the wire) matches the first case.
    let input = decode(&set, "T4", "D", &[]);
    assert_eq!(render(&set, "T4", input), "<span>A</span>");
}

#[test]
fn s5_boolean_attribute_and_reactive_lowering() {
    let set = set_of(&[(
        "T5",
        "/** message D { bool locked = 1; } */\n// data: D\nel { button disabled=`locked` { ~ { on:click \"@post('/x')\" .warn $isWarn } \"Go\" } }",
    )]);

    let mut bytes = Vec::new();
    wire::varint_field(1, 1, &mut bytes);
    let input = decode(&set, "T5", "D", &bytes);
    assert_eq!(
        render(&set, "T5", input),
        "<button disabled data-on-click=\"@post('/x')\" data-class-warn=\"$isWarn\">Go</button>"
    );

    // Falsy: the boolean attribute is absent entirely.
    let input = decode(&set, "T5", "D", &[]);
    assert_eq!(
        render(&set, "T5", input),
        "<button data-on-click=\"@post('/x')\" data-class-warn=\"$isWarn\">Go</button>"
    );
}

#[test]
fn s6_component_composition_with_slot() {
    let source = "// name: Layout\nel { html { body { main { #content } } } }\n\
// name: Home\nel { Layout { p \"hi\" } }";
    let set = set_of(&[("pages", source)]);
    assert_eq!(
        render(&set, "Home", Value::Null),
        "<html><body><main><p>hi</p></main></body></html>"
    );
}

#[test]
fn empty_iterable_renders_nothing() {
    let set = set_of(&[(
        "T",
        "/** message D { repeated string items = 1; } */\n// data: D\nel { each item `items` { li \"`item`\" } }",
    )]);
    let input = decode(&set, "T", "D", &[]);
    assert_eq!(render(&set, "T", input), "");
}

#[test]
fn void_elements_have_no_close_tag() {
    let set = set_of(&[("T", "el { div { br; img src=\"/x.png\" } }")]);
    assert_eq!(
        render(&set, "T", Value::Null),
        "<div><br><img src=\"/x.png\"></div>"
    );
}

#[test]
fn raw_is_inserted_verbatim_exactly_once() {
    let set = set_of(&[("T", "el { div { `raw('<b>hi</b>')` } }")]);
    assert_eq!(render(&set, "T", Value::Null), "<div><b>hi</b></div>");
}

#[test]
fn non_raw_markup_is_escaped() {
    let set = set_of(&[("T", "el { div { `'<b>hi</b>'` } }")]);
    assert_eq!(
        render(&set, "T", Value::Null),
        "<div>&lt;b&gt;hi&lt;/b&gt;</div>"
    );
}

#[test]
fn eval_errors_fail_soft_with_marker() {
    let set = set_of(&[("T", "el { p { `missing_var` } span \"ok\" }")]);
    let rendered = Renderer::new(&set).render("T", Value::Null).unwrap();
    assert_eq!(rendered.errors.len(), 1);
    assert!(rendered.html.contains("<p><span title="));
    assert!(rendered.html.contains(">ERROR</span></p>"));
    // Rendering continued past the failure.
    assert!(rendered.html.ends_with("<span>ok</span>"));
}

#[test]
fn unknown_component_is_a_render_error() {
    let set = set_of(&[("T", "el { p \"hi\" }")]);
    let err = Renderer::new(&set).render("Nope", Value::Null).unwrap_err();
    assert!(matches!(err, HudlError::RenderError { .. }));
}

#[test]
fn component_call_cycles_are_cut_off() {
    let source = "// name: A\nel { B }\n// name: B\nel { A }";
    let set = set_of(&[("cycle", source)]);
    let err = Renderer::new(&set).render("A", Value::Null).unwrap_err();
    assert!(err.to_string().contains("depth"));
}

#[test]
fn renders_are_deterministic() {
    let source = "/** message D { repeated string items = 1; string name = 2; } */\n// data: D\n\
el { .wrap { p \"`name`\"; ul { each item `items` { li \"`item`\" } } } }";
    let set = set_of(&[("T", source)]);
    let mut bytes = Vec::new();
    wire::string_field(1, "x", &mut bytes);
    wire::string_field(1, "y", &mut bytes);
    wire::string_field(2, "n", &mut bytes);

    let a = render(&set, "T", decode(&set, "T", "D", &bytes));
    let b = render(&set, "T", decode(&set, "T", "D", &bytes));
    assert_eq!(a, b);
}

#[test]
fn slot_content_uses_caller_scope() {
    let source = "/** message D { string name = 1; } */\n\
// name: Frame\nel { section { #content } }\n\
// name: Page\n// data: D\nel { Frame { p \"`name`\" } }";
    let set = set_of(&[("T", source)]);
    let mut bytes = Vec::new();
    wire::string_field(1, "Ada", &mut bytes);
    let input = decode(&set, "T", "D", &bytes);
    assert_eq!(render(&set, "Page", input), "<section><p>Ada</p></section>");
}

#[test]
fn component_argument_becomes_target_input() {
    let source = "/** message D { Inner inner = 1; } message Inner { string label = 1; } */\n\
// name: Badge\nel { span \"`label`\" }\n\
// name: Page\n// data: D\nel { Badge `inner` }";
    let set = set_of(&[("T", source)]);

    let mut inner = Vec::new();
    wire::string_field(1, "new", &mut inner);
    let mut bytes = Vec::new();
    wire::varint(1 << 3 | 2, &mut bytes);
    wire::varint(inner.len() as u64, &mut bytes);
    bytes.extend_from_slice(&inner);

    let input = decode(&set, "T", "D", &bytes);
    assert_eq!(render(&set, "Page", input), "<span>new</span>");
}

#[test]
fn map_fields_iterate_as_entries() {
    let source = "/** message D { map<string, int32> counts = 1; } */\n// data: D\n\
el { ul { each entry `counts` { li \"`entry.key`=`entry.value`\" } } }";
    let set = set_of(&[("T", source)]);

    let mut entry_a = Vec::new();
    wire::string_field(1, "a", &mut entry_a);
    wire::varint_field(2, 1, &mut entry_a);
    let mut entry_b = Vec::new();
    wire::string_field(1, "b", &mut entry_b);
    wire::varint_field(2, 2, &mut entry_b);

    let mut bytes = Vec::new();
    for entry in [&entry_a, &entry_b] {
        wire::varint(1 << 3 | 2, &mut bytes);
        wire::varint(entry.len() as u64, &mut bytes);
        bytes.extend_from_slice(entry);
    }

    let input = decode(&set, "T", "D", &bytes);
    assert_eq!(
        render(&set, "T", input),
        "<ul><li>a=1</li><li>b=2</li></ul>"
    );
}

#[test]
fn scoped_styles_hash_and_prefix() {
    let set = set_of(&[(
        "T",
        "el { .card { style { .title { padding 10px; color red } } h1.title \"Hi\" } }",
    )]);
    let html = render(&set, "T", Value::Null);

    // The scope class lands on the owning element and prefixes the rules,
    // and the numeric-prefix shim is stripped from values.
    assert!(html.starts_with("<div class=\"card h-"));
    assert!(html.contains("<style>.h-"));
    assert!(html.contains(".title{padding:10px;color:red}</style>"));
    assert!(html.ends_with("<h1 class=\"title\">Hi</h1></div>"));

    // Stable across renders.
    assert_eq!(html, render(&set, "T", Value::Null));
}

#[test]
fn render_deadline_aborts() {
    let set = set_of(&[("T", "el { p \"hi\" }")]);
    let renderer = Renderer::new(&set).with_deadline(Duration::from_millis(0));
    std::thread::sleep(Duration::from_millis(5));
    let err = renderer.render("T", Value::Null).unwrap_err();
    assert!(err.to_string().contains("deadline"));
}
