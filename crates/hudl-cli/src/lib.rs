// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI for the hudl templating engine: dev server, checker and formatter.

/// Subcommand implementations.
pub mod commands;
/// Project configuration (`hudl.toml`).
pub mod config;
/// Preview data files (`*.preview.txtpb`).
pub mod preview;
/// Development HTTP server.
pub mod server;
/// File watching for hot reload.
pub mod watcher;
