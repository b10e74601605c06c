// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lowering of reactive attributes to their `data-*` output form.
//!
//! The mapping is fixed: the core never executes these attributes, it only
//! hands them to a downstream client runtime. Well-known DOM events use the
//! dash form `data-on-click`; anything else keeps the colon form
//! `data-on:custom-event` so custom event names survive unmangled.

use crate::ast::{ReactiveAttr, ReactiveKind};

/// Lowers one reactive attribute to its output name and optional value.
pub fn lower(attr: &ReactiveAttr) -> (String, Option<String>) {
    let mut name = match &attr.kind {
        ReactiveKind::Bind => "data-bind".to_string(),
        ReactiveKind::Let { name, computed: false } => format!("data-signals-{name}"),
        ReactiveKind::Let { name, computed: true } => format!("data-computed-{name}"),
        ReactiveKind::On { event } => {
            if is_well_known_event(event) {
                format!("data-on-{event}")
            } else {
                format!("data-on:{event}")
            }
        }
        ReactiveKind::Show => "data-show".to_string(),
        ReactiveKind::Text => "data-text".to_string(),
        ReactiveKind::Class { name } => format!("data-class-{name}"),
        ReactiveKind::Attr { name } => format!("data-attr-{name}"),
        ReactiveKind::Persist => "data-persist".to_string(),
        ReactiveKind::Ref => "data-ref".to_string(),
        ReactiveKind::Teleport => "data-teleport".to_string(),
        ReactiveKind::ScrollIntoView => "data-scroll-into-view".to_string(),
    };

    for modifier in &attr.modifiers {
        name.push_str("__");
        name.push_str(&modifier.name);
        if let Some(value) = &modifier.value {
            name.push('.');
            name.push_str(value);
        }
    }

    (name, attr.value.clone())
}

/// Standard DOM events lowered to the dash form. Everything else is treated
/// as a custom event and keeps the colon form.
fn is_well_known_event(event: &str) -> bool {
    matches!(
        event.to_ascii_lowercase().as_str(),
        "click"
            | "dblclick"
            | "input"
            | "change"
            | "submit"
            | "reset"
            | "mousedown"
            | "mouseup"
            | "mouseover"
            | "mouseout"
            | "mousemove"
            | "mouseenter"
            | "mouseleave"
            | "keydown"
            | "keyup"
            | "keypress"
            | "focus"
            | "blur"
            | "touchstart"
            | "touchend"
            | "touchmove"
            | "touchcancel"
            | "pointerdown"
            | "pointerup"
            | "pointermove"
            | "pointerenter"
            | "pointerleave"
            | "pointercancel"
            | "contextmenu"
            | "wheel"
            | "scroll"
            | "load"
            | "drag"
            | "dragstart"
            | "dragend"
            | "dragenter"
            | "dragleave"
            | "dragover"
            | "drop"
    )
}
