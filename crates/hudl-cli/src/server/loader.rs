// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Startup crawl of a template tree into a document set.

use std::path::{Path, PathBuf};

use hudl::{load_document, DocumentSet};

/// Documents end in this suffix.
pub const DOCUMENT_EXTENSION: &str = "hudl";

/// All `.hudl` files under `dir`, sorted for deterministic load order.
pub fn document_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.{}", dir.display(), DOCUMENT_EXTENSION);
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Parses every document under `dir` into a linked set.
///
/// Parse failures do not abort the crawl: the failing file is reported and
/// skipped, so one broken template cannot take the server down at startup.
pub fn load_tree(dir: &Path) -> anyhow::Result<(DocumentSet, Vec<String>)> {
    let mut set = DocumentSet::new();
    let mut failures = Vec::new();

    for path in document_paths(dir)? {
        match load_document(&path) {
            Ok(doc) => {
                for diagnostic in &doc.diagnostics {
                    tracing::warn!(file = %path.display(), "{diagnostic}");
                }
                set.insert_unlinked(doc);
            }
            Err(e) => {
                tracing::error!(file = %path.display(), "parse failed: {e}");
                failures.push(format!("{}: {e}", path.display()));
            }
        }
    }
    set.link_all();

    Ok((set, failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn crawls_nested_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.hudl"), "// name: A\nel { p \"a\" }").unwrap();
        fs::write(dir.path().join("sub/b.hudl"), "// name: B\nel { p \"b\" }").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (set, failures) = load_tree(dir.path()).unwrap();
        assert!(failures.is_empty());
        assert_eq!(set.component_count(), 2);
        assert!(set.document("a").is_some());
        assert!(set.document("b").is_some());
    }

    #[test]
    fn broken_documents_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.hudl"), "// name: Good\nel { p \"g\" }").unwrap();
        fs::write(dir.path().join("bad.hudl"), "el { p \"unterminated }").unwrap();

        let (set, failures) = load_tree(dir.path()).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(set.component_count(), 1);
    }
}
