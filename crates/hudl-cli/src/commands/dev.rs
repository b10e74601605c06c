// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server command with hot reload support.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;
use hudl::{load_document, Registry};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::server::http::{create_server, AppState};
use crate::server::loader::load_tree;
use crate::watcher::FileWatcher;

/// Runs the development server with hot reload.
pub async fn run(
    host: Option<String>,
    port: Option<u16>,
    dir: Option<String>,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.dev.host = host;
    }
    if let Some(port) = port {
        config.dev.port = port;
    }
    if let Some(dir) = dir {
        config.dev.templates_dir = dir;
    }

    let templates_dir = PathBuf::from(&config.dev.templates_dir);
    if !templates_dir.is_dir() {
        anyhow::bail!(
            "templates directory {} does not exist",
            templates_dir.display()
        );
    }

    let (set, failures) = load_tree(&templates_dir)?;
    if !quiet {
        println!(
            "{} {} component(s) from {}",
            style("Loaded:").cyan(),
            style(set.component_count()).green(),
            style(templates_dir.display()).dim()
        );
        for failure in &failures {
            eprintln!("  {} {}", style("✗").red(), style(failure).red());
        }
    }

    let registry = Arc::new(Registry::new(set));

    // Reload notifications; one event per affected component. Slow SSE
    // subscribers fall behind and skip, they are never waited on.
    let (reload_tx, _) = broadcast::channel::<String>(64);
    let reload_tx = Arc::new(reload_tx);

    let watcher_registry = registry.clone();
    let watcher_tx = reload_tx.clone();
    let quiet_watcher = quiet;
    let _watcher = FileWatcher::new(&templates_dir, move |paths| {
        let start = Instant::now();
        let mut reloaded = Vec::new();
        for path in &paths {
            reloaded.extend(reparse(&watcher_registry, path));
        }
        for component in &reloaded {
            let _ = watcher_tx.send(component.clone());
        }

        if !quiet_watcher && !paths.is_empty() {
            let display = paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");

            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner:.cyan} hudl {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(display.clone());
            pb.enable_steady_tick(Duration::from_millis(80));

            let total_ms = start.elapsed().as_millis();
            pb.finish_with_message(format!(
                "{} {} {}",
                style("✓").green(),
                style(&display).dim(),
                style(format!("{}ms", total_ms)).dim()
            ));
        }
    })?;

    let addr = config.dev_addr();
    if !quiet {
        println!(
            "{} {}",
            style("Server:").cyan(),
            style(format!("http://{}", addr)).green().bold()
        );
        println!(
            "{} {}",
            style("Status:").cyan(),
            style("Watching for changes...").dim()
        );
        println!();
    }

    let state = Arc::new(AppState { registry, reload_tx, config });
    create_server(&addr, state).await?;

    Ok(())
}

/// Reparses one changed document and publishes it to the registry.
///
/// Returns the names of the components to notify. On parse failure the
/// previous entry is retained (stale-but-servable) and only a diagnostic is
/// logged; subscribers hear about the file again after the next successful
/// reparse.
fn reparse(registry: &Registry, path: &Path) -> Vec<String> {
    let stem = match path.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => return Vec::new(),
    };

    if !path.exists() {
        // Source removed: drop its components from the registry.
        let snapshot = registry.snapshot();
        let removed: Vec<String> = snapshot
            .documents
            .document(&stem)
            .map(|doc| doc.components.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        registry.remove_document(&stem);
        return removed;
    }

    match load_document(path) {
        Ok(doc) => {
            for diagnostic in &doc.diagnostics {
                tracing::warn!(file = %path.display(), "{diagnostic}");
            }
            let inserted = registry.replace_document(doc);
            inserted.components.iter().map(|c| c.name.clone()).collect()
        }
        Err(e) => {
            tracing::error!(file = %path.display(), "reparse failed, serving last-known-good: {e}");
            Vec::new()
        }
    }
}
