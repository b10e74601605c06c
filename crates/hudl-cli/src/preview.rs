// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Preview data files: named mock inputs stored beside source documents.
//!
//! A component's previews live as `<component>.preview.txtpb` (the default)
//! and `<component>_<label>.preview.txtpb` (named variants) in the same
//! directory as the defining document. Content is the IDL's text form. A
//! missing default is synthesized from the schema on first access.

use std::fs;
use std::path::{Path, PathBuf};

use hudl::schema::textpb;
use hudl::{Document, Schema};
use serde::Serialize;

/// The preview file extension, including the leading dot.
pub const PREVIEW_SUFFIX: &str = ".preview.txtpb";

/// One preview file of a component.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreviewFile {
    /// The label; empty for the default preview.
    pub label: String,
    /// Path on disk.
    pub file: PathBuf,
}

/// The directory previews for a document live in.
fn preview_dir(document: &Document) -> Option<PathBuf> {
    document
        .path
        .as_ref()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
}

/// The path of a component's preview with the given label.
pub fn preview_path(document: &Document, component: &str, label: &str) -> Option<PathBuf> {
    let dir = preview_dir(document)?;
    let file_name = if label.is_empty() {
        format!("{component}{PREVIEW_SUFFIX}")
    } else {
        format!("{component}_{label}{PREVIEW_SUFFIX}")
    };
    Some(dir.join(file_name))
}

/// Lists the preview files that exist for a component, default first.
pub fn list_previews(document: &Document, component: &str) -> Vec<PreviewFile> {
    let Some(dir) = preview_dir(document) else {
        return Vec::new();
    };
    let mut found = Vec::new();

    let default = dir.join(format!("{component}{PREVIEW_SUFFIX}"));
    if default.exists() {
        found.push(PreviewFile { label: String::new(), file: default });
    }

    let labelled_prefix = format!("{component}_");
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return found,
    };
    let mut labelled: Vec<PreviewFile> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let stem = name.strip_suffix(PREVIEW_SUFFIX)?;
            let label = stem.strip_prefix(&labelled_prefix)?;
            if label.is_empty() {
                return None;
            }
            Some(PreviewFile { label: label.to_string(), file: entry.path() })
        })
        .collect();
    labelled.sort_by(|a, b| a.label.cmp(&b.label));
    found.extend(labelled);
    found
}

/// Reads a preview, synthesizing and persisting the default skeleton when
/// the file does not exist yet.
pub fn read_or_create(
    document: &Document,
    component: &str,
    label: &str,
    data_type: Option<&str>,
    schema: &Schema,
) -> std::io::Result<String> {
    let Some(path) = preview_path(document, component, label) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "document has no source path",
        ));
    };
    if path.exists() {
        return fs::read_to_string(&path);
    }

    let content = default_content(data_type, schema);
    fs::write(&path, &content)?;
    Ok(content)
}

/// Writes preview content.
pub fn write_preview(
    document: &Document,
    component: &str,
    label: &str,
    content: &str,
) -> std::io::Result<PathBuf> {
    let Some(path) = preview_path(document, component, label) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "document has no source path",
        ));
    };
    fs::write(&path, content)?;
    Ok(path)
}

/// The default skeleton for a component's declared input.
pub fn default_content(data_type: Option<&str>, schema: &Schema) -> String {
    match data_type.and_then(|ty| schema.message(ty)) {
        Some(message) => textpb::default_text(message, schema),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hudl::parse_document;
    use tempfile::TempDir;

    fn doc_with_path(dir: &Path) -> Document {
        let source = "/** message D { string name = 1; int32 n = 2; } */\n// name: Card\n// data: D\nel { p \"hi\" }";
        let path = dir.join("card.hudl");
        fs::write(&path, source).unwrap();
        let mut doc = parse_document(source, "card").unwrap();
        doc.path = Some(path);
        doc
    }

    #[test]
    fn default_is_created_on_first_access() {
        let dir = TempDir::new().unwrap();
        let doc = doc_with_path(dir.path());

        let content = read_or_create(&doc, "Card", "", Some("D"), &doc.schema).unwrap();
        assert!(content.contains("name: \"\""));
        assert!(content.contains("n: 0"));
        assert!(dir.path().join("Card.preview.txtpb").exists());

        // Second access reads the persisted file.
        fs::write(dir.path().join("Card.preview.txtpb"), "name: \"x\"\n").unwrap();
        let content = read_or_create(&doc, "Card", "", Some("D"), &doc.schema).unwrap();
        assert_eq!(content, "name: \"x\"\n");
    }

    #[test]
    fn listing_orders_default_first() {
        let dir = TempDir::new().unwrap();
        let doc = doc_with_path(dir.path());
        fs::write(dir.path().join("Card_b.preview.txtpb"), "").unwrap();
        fs::write(dir.path().join("Card.preview.txtpb"), "").unwrap();
        fs::write(dir.path().join("Card_a.preview.txtpb"), "").unwrap();
        fs::write(dir.path().join("Other.preview.txtpb"), "").unwrap();

        let files = list_previews(&doc, "Card");
        let labels: Vec<&str> = files.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["", "a", "b"]);
    }

    #[test]
    fn labelled_path_shape() {
        let dir = TempDir::new().unwrap();
        let doc = doc_with_path(dir.path());
        let path = preview_path(&doc, "Card", "wide").unwrap();
        assert!(path.ends_with("Card_wide.preview.txtpb"));
    }
}
