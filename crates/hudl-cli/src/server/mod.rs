// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development HTTP server.

/// HTTP routes and handlers.
pub mod http;
/// Template tree loading.
pub mod loader;

pub use http::{build_app, create_server, AppState};
pub use loader::load_tree;
