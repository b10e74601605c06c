// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The template registry: the dev server's shared, snapshot-replaceable view
//! of every parsed document.
//!
//! Readers pin one [`RegistrySnapshot`] for the lifetime of a request, so a
//! render never observes a half-applied update. Writers (the watcher) clone
//! the current snapshot, replace the affected document's entries, and swap
//! the whole snapshot in under a short write lock. On reparse failure
//! nothing is swapped, which is what keeps the last-known-good entries
//! servable.

use std::sync::{Arc, RwLock};

use time::OffsetDateTime;

use crate::document::{Document, DocumentSet};
use crate::render::{ComponentLookup, ResolvedComponent};

/// A consistent, immutable view of the registry.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// The documents and their components.
    pub documents: DocumentSet,
    /// When the registry last changed.
    pub last_reload: OffsetDateTime,
}

impl ComponentLookup for RegistrySnapshot {
    fn resolve(&self, from_document: Option<&str>, name: &str) -> Option<ResolvedComponent<'_>> {
        self.documents.resolve(from_document, name)
    }
}

/// Shared registry with copy-on-write snapshot replacement.
pub struct Registry {
    inner: RwLock<Arc<RegistrySnapshot>>,
}

impl Registry {
    /// Creates a registry from an initial document set.
    pub fn new(documents: DocumentSet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(RegistrySnapshot {
                documents,
                last_reload: OffsetDateTime::now_utc(),
            })),
        }
    }

    /// The current snapshot. Cheap; callers keep the `Arc` for as long as
    /// they need a consistent view.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Atomically replaces the entries of one document. Components defined
    /// by other documents keep their existing `Arc`s.
    pub fn replace_document(&self, document: Document) -> Arc<Document> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut documents = guard.documents.clone();
        let inserted = documents.insert(document);
        tracing::debug!(
            document = %inserted.name,
            components = inserted.components.len(),
            "registry entry replaced"
        );
        *guard = Arc::new(RegistrySnapshot {
            documents,
            last_reload: OffsetDateTime::now_utc(),
        });
        inserted
    }

    /// Removes a document (source file deleted). Returns true when present.
    pub fn remove_document(&self, name: &str) -> bool {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut documents = guard.documents.clone();
        let removed = documents.remove(name);
        if removed {
            *guard = Arc::new(RegistrySnapshot {
                documents,
                last_reload: OffsetDateTime::now_utc(),
            });
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    fn doc(name: &str, body: &str) -> Document {
        parse_document(body, name).unwrap()
    }

    #[test]
    fn snapshots_are_pinned() {
        let mut set = DocumentSet::new();
        set.insert(doc("a", "// name: A\nel { p \"one\" }"));
        let registry = Registry::new(set);

        let before = registry.snapshot();
        registry.replace_document(doc("a", "// name: A\nel { p \"two\" }"));
        let after = registry.snapshot();

        // The pinned snapshot still sees the old component tree.
        assert!(before.resolve(None, "A").is_some());
        assert!(!Arc::ptr_eq(
            before.documents.document("a").unwrap(),
            after.documents.document("a").unwrap()
        ));
    }

    #[test]
    fn replacement_keeps_unrelated_entries() {
        let mut set = DocumentSet::new();
        set.insert(doc("a", "// name: A\nel { p \"a\" }"));
        set.insert(doc("b", "// name: B\nel { p \"b\" }"));
        let registry = Registry::new(set);

        let before = registry.snapshot();
        registry.replace_document(doc("b", "// name: B\nel { p \"b2\" }"));
        let after = registry.snapshot();

        assert!(Arc::ptr_eq(
            before.documents.document("a").unwrap(),
            after.documents.document("a").unwrap()
        ));
        assert!(after.last_reload >= before.last_reload);
    }

    #[test]
    fn failed_reparse_leaves_registry_untouched() {
        let mut set = DocumentSet::new();
        set.insert(doc("a", "// name: A\nel { p \"a\" }"));
        let registry = Registry::new(set);
        let before = registry.snapshot();

        // A reparse failure never reaches replace_document; the caller just
        // logs. The registry still serves the last-known-good entry.
        assert!(parse_document("el { p \"unterminated }", "a").is_err());
        let after = registry.snapshot();
        assert!(Arc::ptr_eq(
            before.documents.document("a").unwrap(),
            after.documents.document("a").unwrap()
        ));
    }

    #[test]
    fn remove_document_drops_components() {
        let mut set = DocumentSet::new();
        set.insert(doc("a", "// name: A\nel { p \"a\" }"));
        let registry = Registry::new(set);
        assert!(registry.remove_document("a"));
        assert!(registry.snapshot().resolve(None, "A").is_none());
        assert!(!registry.remove_document("a"));
    }
}
