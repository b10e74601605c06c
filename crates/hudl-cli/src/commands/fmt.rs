// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `hudl fmt`: canonical formatter over files or directories.

use std::fs;
use std::path::PathBuf;

use console::style;
use hudl::format_source;

use crate::config::Config;
use crate::server::loader::document_paths;

/// Formats the given paths (directories recurse). With `check` set, writes
/// nothing and errors when any file is not canonically formatted.
pub fn run(paths: Vec<String>, check: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let paths = if paths.is_empty() {
        vec![config.dev.templates_dir.clone()]
    } else {
        paths
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        let path = PathBuf::from(path);
        if path.is_dir() {
            files.extend(document_paths(&path)?);
        } else {
            files.push(path);
        }
    }

    let mut changed = 0usize;
    let mut failed = 0usize;

    for file in &files {
        let source = fs::read_to_string(file)?;
        let formatted = match format_source(&source) {
            Ok(formatted) => formatted,
            Err(e) => {
                failed += 1;
                eprintln!("{} {}", style("error:").red().bold(), e.with_file(&file.to_string_lossy()));
                continue;
            }
        };
        if formatted == source {
            continue;
        }
        changed += 1;
        if check {
            println!("{} {}", style("would reformat:").yellow(), file.display());
        } else {
            fs::write(file, formatted)?;
            println!("{} {}", style("formatted:").green(), file.display());
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed to parse");
    }
    if check && changed > 0 {
        anyhow::bail!("{changed} file(s) would be reformatted");
    }
    Ok(())
}
