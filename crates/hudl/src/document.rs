// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Whole-document pipeline and multi-document sets.
//!
//! [`parse_document`] runs normalize → parse → schema → transform for one
//! source and yields a [`Document`]. A [`DocumentSet`] holds the documents
//! of a template tree, links schemas across imports (cycle-tolerant), and
//! resolves component calls through each document's import closure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::Component;
use crate::error::{HudlError, Result};
use crate::parser::parse_source;
use crate::render::{ComponentLookup, ResolvedComponent};
use crate::schema::{parse_schema_blocks, Schema};
use crate::transform::transform_document;

/// One compiled source document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Logical name: the file stem.
    pub name: String,
    /// Source path, when the document came from disk.
    pub path: Option<PathBuf>,
    /// Schema visible to this document (local blocks, plus imported
    /// definitions once the document is inserted into a set).
    pub schema: Schema,
    /// Components defined here, in source order.
    pub components: Vec<Component>,
    /// Imported document names (file stems), from `import { … }` nodes and
    /// schema `import` statements.
    pub imports: Vec<String>,
    /// Non-fatal diagnostics from the transform.
    pub diagnostics: Vec<String>,
}

impl Document {
    /// Finds a component defined in this document.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Parses one document. The schema contains local blocks only; imports are
/// linked when the document joins a [`DocumentSet`].
pub fn parse_document(source: &str, name: &str) -> Result<Document> {
    let raw = parse_source(source)?;
    let schema = parse_schema_blocks(raw.schema_blocks())?;
    let transformed = transform_document(&raw, &schema, name)?;

    let mut imports: Vec<String> = Vec::new();
    for path in transformed.imports.iter().chain(schema.imports.iter()) {
        let stem = import_stem(path);
        if !imports.contains(&stem) {
            imports.push(stem);
        }
    }

    Ok(Document {
        name: name.to_string(),
        path: None,
        schema,
        components: transformed.components,
        imports,
        diagnostics: transformed.diagnostics,
    })
}

/// Import paths name neighbor documents; the registry key is the file stem.
fn import_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Reads and parses a document from disk, deriving the logical name from
/// the file stem.
pub fn load_document(path: &Path) -> Result<Document> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| {
            HudlError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a document path: {}", path.display()),
            ))
        })?;
    let source = std::fs::read_to_string(path)?;
    let mut doc = parse_document(&source, &name).map_err(|e| e.with_file(&path.to_string_lossy()))?;
    doc.path = Some(path.to_path_buf());
    Ok(doc)
}

/// An immutable snapshot of a template tree's documents.
///
/// Cloning is cheap (documents are behind [`Arc`]s), which is what lets the
/// registry swap whole snapshots while requests keep a consistent view.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: IndexMap<String, Arc<Document>>,
}

impl DocumentSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document, linking its schema against the documents already
    /// present. Replaces any previous document of the same name.
    pub fn insert(&mut self, mut document: Document) -> Arc<Document> {
        self.link_schema(&mut document);
        let arc = Arc::new(document);
        self.documents.insert(arc.name.clone(), arc.clone());
        arc
    }

    /// Inserts a document as-is, without schema linking. Used by bulk loads
    /// that call [`DocumentSet::link_all`] afterwards.
    pub fn insert_unlinked(&mut self, document: Document) {
        self.documents
            .insert(document.name.clone(), Arc::new(document));
    }

    /// Relinks every document's schema. Called once after a bulk load so
    /// import order does not matter.
    pub fn link_all(&mut self) {
        let names: Vec<String> = self.documents.keys().cloned().collect();
        for name in names {
            let mut doc = (*self.documents[&name]).clone();
            self.link_schema(&mut doc);
            self.documents.insert(name, Arc::new(doc));
        }
    }

    /// Merges the schemas of the transitive import closure into `document`.
    /// A visited set makes import cycles harmless.
    fn link_schema(&self, document: &mut Document) {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(document.name.clone());
        let mut queue: Vec<String> = document.imports.clone();

        while let Some(name) = queue.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(imported) = self.documents.get(&name) {
                document.schema.merge_from(&imported.schema);
                queue.extend(imported.imports.iter().cloned());
            }
        }
    }

    /// Removes a document. Returns true when it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.documents.shift_remove(name).is_some()
    }

    /// Looks up a document by name.
    pub fn document(&self, name: &str) -> Option<&Arc<Document>> {
        self.documents.get(name)
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.values()
    }

    /// Total number of components across all documents.
    pub fn component_count(&self) -> usize {
        self.documents.values().map(|d| d.components.len()).sum()
    }

    /// Iterates `(document, component)` pairs in insertion order.
    pub fn components(&self) -> impl Iterator<Item = (&Arc<Document>, &Component)> {
        self.documents
            .values()
            .flat_map(|doc| doc.components.iter().map(move |c| (doc, c)))
    }

    fn resolved<'a>(&'a self, doc: &'a Document, name: &str) -> Option<ResolvedComponent<'a>> {
        doc.component(name).map(|component| ResolvedComponent {
            document: &doc.name,
            component,
            schema: &doc.schema,
        })
    }
}

impl ComponentLookup for DocumentSet {
    fn resolve(&self, from_document: Option<&str>, name: &str) -> Option<ResolvedComponent<'_>> {
        match from_document {
            None => self
                .documents
                .values()
                .find_map(|doc| self.resolved(doc, name)),
            Some(from) => {
                // The document's own components first, then its import
                // closure breadth-first.
                let mut visited: HashSet<&str> = HashSet::new();
                let mut queue: Vec<&str> = vec![from];
                while let Some(doc_name) = queue.pop() {
                    if !visited.insert(doc_name) {
                        continue;
                    }
                    if let Some(doc) = self.documents.get(doc_name) {
                        if let Some(resolved) = self.resolved(doc, name) {
                            return Some(resolved);
                        }
                        queue.extend(doc.imports.iter().map(String::as_str));
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_document() {
        let doc = parse_document(
            "/** message D { string name = 1; } */\n// name: Card\n// data: D\nel { p \"hi\" }",
            "card",
        )
        .unwrap();
        assert_eq!(doc.components.len(), 1);
        assert_eq!(doc.components[0].name, "Card");
        assert!(doc.schema.message("D").is_some());
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn imports_link_schemas_across_documents() {
        let shared = parse_document(
            "/** message User { string name = 1; } */\n// name: Avatar\nel { p \"a\" }",
            "shared",
        )
        .unwrap();
        let page = parse_document(
            "import { \"shared.hudl\" }\n// name: Page\n// data: User\nel { p \"p\" }",
            "page",
        )
        .unwrap();
        // Before linking the import, User is unknown.
        assert_eq!(page.diagnostics.len(), 1);

        let mut set = DocumentSet::new();
        set.insert_unlinked(shared);
        set.insert_unlinked(page);
        set.link_all();

        let linked = set.document("page").unwrap();
        assert!(linked.schema.message("User").is_some());
    }

    #[test]
    fn component_resolution_follows_import_closure() {
        let mut set = DocumentSet::new();
        set.insert(parse_document("// name: Widget\nel { p \"w\" }", "lib").unwrap());
        set.insert(
            parse_document("import { \"lib.hudl\" }\n// name: Page\nel { Widget }", "page")
                .unwrap(),
        );

        assert!(set.resolve(Some("page"), "Widget").is_some());
        assert!(set.resolve(Some("lib"), "Page").is_none());
        assert!(set.resolve(None, "Page").is_some());
    }

    #[test]
    fn import_cycles_are_tolerated() {
        let mut set = DocumentSet::new();
        set.insert_unlinked(
            parse_document("import { \"b.hudl\" }\n// name: A\nel { p \"a\" }", "a").unwrap(),
        );
        set.insert_unlinked(
            parse_document("import { \"a.hudl\" }\n// name: B\nel { p \"b\" }", "b").unwrap(),
        );
        set.link_all();
        assert!(set.resolve(Some("a"), "B").is_some());
        assert!(set.resolve(Some("b"), "A").is_some());
    }

    #[test]
    fn replacement_preserves_other_documents() {
        let mut set = DocumentSet::new();
        let a = set.insert(parse_document("// name: A\nel { p \"a\" }", "a").unwrap());
        set.insert(parse_document("// name: B\nel { p \"b\" }", "b").unwrap());

        let snapshot = set.clone();
        set.insert(parse_document("// name: B\nel { p \"b2\" }", "b").unwrap());

        // The untouched document is the same allocation in both snapshots.
        assert!(Arc::ptr_eq(&a, set.document("a").unwrap()));
        assert!(Arc::ptr_eq(
            snapshot.document("a").unwrap(),
            set.document("a").unwrap()
        ));
        assert!(!Arc::ptr_eq(
            snapshot.document("b").unwrap(),
            set.document("b").unwrap()
        ));
    }
}
