// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI subcommands.

/// `hudl check`: validate a template tree.
pub mod check;
/// `hudl dev`: development server with hot reload.
pub mod dev;
/// `hudl fmt`: canonical formatter.
pub mod fmt;
