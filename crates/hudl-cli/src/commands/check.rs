// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `hudl check`: parse and validate every document under a directory.

use std::path::PathBuf;

use console::style;
use hudl::load_document;

use crate::config::Config;
use crate::server::loader::document_paths;

/// Checks every document, printing diagnostics. Errors if any fail.
pub fn run(dir: Option<String>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let dir = PathBuf::from(dir.unwrap_or(config.dev.templates_dir));
    if !dir.is_dir() {
        anyhow::bail!("directory {} does not exist", dir.display());
    }

    let mut checked = 0usize;
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for path in document_paths(&dir)? {
        checked += 1;
        match load_document(&path) {
            Ok(doc) => {
                for diagnostic in &doc.diagnostics {
                    warnings += 1;
                    println!(
                        "{} {}: {}",
                        style("warning:").yellow().bold(),
                        path.display(),
                        diagnostic
                    );
                }
            }
            Err(e) => {
                errors += 1;
                println!("{} {}", style("error:").red().bold(), e);
            }
        }
    }

    println!(
        "{} {} file(s), {} error(s), {} warning(s)",
        style("Checked:").cyan(),
        checked,
        errors,
        warnings
    );

    if errors > 0 {
        anyhow::bail!("{errors} document(s) failed to parse");
    }
    Ok(())
}
