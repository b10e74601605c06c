// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for hot reload.
//!
//! Watches a template tree for `.hudl` changes, debounced so editor save
//! bursts coalesce into one reparse. Changed documents are reparsed and
//! published to the registry; a failed reparse keeps the last-known-good
//! entry servable and only logs the diagnostic.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, Debouncer, NoCache};

use crate::server::loader::DOCUMENT_EXTENSION;

/// Debounce window for coalescing change bursts.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches a template tree for document changes.
///
/// The callback receives the affected paths; only `.hudl` files trigger it.
pub struct FileWatcher {
    #[allow(dead_code)]
    debouncer: Debouncer<RecommendedWatcher, NoCache>,
    #[allow(dead_code)]
    rx: mpsc::Receiver<
        Result<Vec<notify_debouncer_full::DebouncedEvent>, Vec<notify::Error>>,
    >,
}

impl FileWatcher {
    /// Creates a watcher over `path`, invoking `on_change` with the changed
    /// document paths after each debounce window.
    pub fn new<F>(path: &Path, on_change: F) -> anyhow::Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let mut debouncer = new_debouncer(
            DEBOUNCE,
            None,
            move |result: Result<Vec<notify_debouncer_full::DebouncedEvent>, Vec<notify::Error>>| {
                if let Ok(events) = &result {
                    let mut changed: Vec<PathBuf> = events
                        .iter()
                        .flat_map(|e| e.paths.iter())
                        .filter(|p| {
                            p.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
                        })
                        .cloned()
                        .collect();
                    changed.sort();
                    changed.dedup();
                    if !changed.is_empty() {
                        on_change(changed);
                    }
                }
                let _ = tx.send(result);
            },
        )?;

        debouncer.watch(path, RecursiveMode::Recursive)?;

        Ok(Self { debouncer, rx })
    }
}
