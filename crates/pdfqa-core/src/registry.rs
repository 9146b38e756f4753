//! Documents known to the client and which one is active

use crate::document::{Document, DocumentId};
use crate::error::SessionError;
use tracing::info;

/// How a registry update changed the active document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveChange {
    Unchanged,
    /// A document became active (automatically or by request)
    Selected(DocumentId),
    /// The active document vanished from the service and nothing replaced it
    Cleared,
}

impl ActiveChange {
    pub fn changed(&self) -> bool {
        !matches!(self, ActiveChange::Unchanged)
    }
}

#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: Vec<Document>,
    active: Option<DocumentId>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All documents in the order the service returned them
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Documents that may be offered as chat targets
    pub fn selectable(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| d.is_selectable())
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn active_id(&self) -> Option<DocumentId> {
        self.active
    }

    pub fn active(&self) -> Option<&Document> {
        self.active.and_then(|id| self.get(id))
    }

    /// Replace the whole set with a fresh listing from the service.
    ///
    /// An active document that is no longer listed is dropped. While nothing is active, the
    /// first processed document in listing order becomes active.
    pub fn replace(&mut self, documents: Vec<Document>) -> ActiveChange {
        self.documents = documents;

        let mut change = ActiveChange::Unchanged;
        if let Some(id) = self.active {
            if self.get(id).is_none() {
                info!(document_id = %id, "active document no longer listed");
                self.active = None;
                change = ActiveChange::Cleared;
            }
        }

        if self.active.is_none() {
            if let Some(first) = self.documents.iter().find(|d| d.is_selectable()) {
                info!(document_id = %first.id, name = %first.display_name(), "auto-selected document");
                self.active = Some(first.id);
                change = ActiveChange::Selected(first.id);
            }
        }

        change
    }

    pub fn select(&mut self, id: DocumentId) -> Result<&Document, SessionError> {
        let document = self
            .documents
            .iter()
            .find(|d| d.id == id)
            .ok_or(SessionError::UnknownDocument(id))?;

        if !document.is_selectable() {
            return Err(SessionError::NotProcessed(id));
        }

        self.active = Some(id);
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::document::tests::doc;

    #[test]
    fn test_replace_auto_selects_first_processed() {
        let mut registry = DocumentRegistry::new();
        let change = registry.replace(vec![doc(1, false), doc(2, true), doc(3, true)]);

        assert_eq!(change, ActiveChange::Selected(DocumentId(2)));
        assert_eq!(registry.active_id(), Some(DocumentId(2)));
    }

    #[test]
    fn test_replace_without_processed_documents_selects_nothing() {
        let mut registry = DocumentRegistry::new();
        assert_eq!(registry.replace(vec![doc(1, false)]), ActiveChange::Unchanged);
        assert_eq!(registry.active_id(), None);
    }

    #[test]
    fn test_replace_never_overrides_explicit_selection() {
        let mut registry = DocumentRegistry::new();
        registry.replace(vec![doc(1, true), doc(2, true)]);
        registry.select(DocumentId(2)).unwrap();

        let change = registry.replace(vec![doc(1, true), doc(2, true)]);
        assert_eq!(change, ActiveChange::Unchanged);
        assert_eq!(registry.active_id(), Some(DocumentId(2)));
    }

    #[test]
    fn test_replace_is_idempotent() {
        let mut registry = DocumentRegistry::new();
        registry.replace(vec![doc(1, false), doc(2, true)]);
        let first = (registry.documents().to_vec(), registry.active_id());

        let change = registry.replace(vec![doc(1, false), doc(2, true)]);
        assert_eq!(change, ActiveChange::Unchanged);
        assert_eq!((registry.documents().to_vec(), registry.active_id()), first);
    }

    #[test]
    fn test_replace_drops_vanished_active_document() {
        let mut registry = DocumentRegistry::new();
        registry.replace(vec![doc(1, true)]);

        assert_eq!(registry.replace(vec![doc(2, false)]), ActiveChange::Cleared);
        assert_eq!(registry.active_id(), None);

        assert_eq!(
            registry.replace(vec![doc(2, false), doc(3, true)]),
            ActiveChange::Selected(DocumentId(3))
        );
    }

    #[test]
    fn test_select_requires_processed() {
        let mut registry = DocumentRegistry::new();
        registry.replace(vec![doc(1, false), doc(2, true)]);

        assert_eq!(
            registry.select(DocumentId(1)).unwrap_err(),
            SessionError::NotProcessed(DocumentId(1))
        );
        assert_eq!(
            registry.select(DocumentId(9)).unwrap_err(),
            SessionError::UnknownDocument(DocumentId(9))
        );
        assert_eq!(registry.active_id(), Some(DocumentId(2)));
    }

    #[test]
    fn test_selectable_is_subset_of_processed() {
        let mut registry = DocumentRegistry::new();
        registry.replace(vec![doc(1, false), doc(2, true), doc(3, false), doc(4, true)]);

        let ids: Vec<DocumentId> = registry.selectable().map(|d| d.id).collect();
        assert_eq!(ids, vec![DocumentId(2), DocumentId(4)]);
        assert!(registry.selectable().all(|d| d.processed));
    }

    #[derive(Debug, Clone)]
    enum RegistryOp {
        Replace(Vec<(i64, bool)>),
        Select(i64),
    }

    fn registry_op() -> impl Strategy<Value = RegistryOp> {
        prop_oneof![
            prop::collection::vec((0i64..6, any::<bool>()), 0..6).prop_map(RegistryOp::Replace),
            (0i64..6).prop_map(RegistryOp::Select),
        ]
    }

    /// Service listings never repeat an id
    fn listing(entries: &[(i64, bool)]) -> Vec<Document> {
        let mut seen = Vec::new();
        entries
            .iter()
            .filter(|(id, _)| {
                let fresh = !seen.contains(id);
                seen.push(*id);
                fresh
            })
            .map(|(id, processed)| doc(*id, *processed))
            .collect()
    }

    proptest! {
        #[test]
        fn test_registry_selection_rules_hold_for_any_sequence(ops in prop::collection::vec(registry_op(), 0..30)) {
            let mut registry = DocumentRegistry::new();

            for op in ops {
                let before = registry.active_id();
                match op {
                    RegistryOp::Replace(entries) => {
                        let documents = listing(&entries);
                        let first_processed = documents.iter().find(|d| d.processed).map(|d| d.id);
                        let still_listed = before.filter(|id| documents.iter().any(|d| d.id == *id));

                        let change = registry.replace(documents);

                        match still_listed {
                            // An active document that is still listed is never replaced
                            Some(id) => {
                                prop_assert_eq!(registry.active_id(), Some(id));
                                prop_assert_eq!(change, ActiveChange::Unchanged);
                            }
                            None => prop_assert_eq!(registry.active_id(), first_processed),
                        }
                    }
                    RegistryOp::Select(id) => {
                        let id = DocumentId(id);
                        let processed = registry.get(id).map(|d| d.processed);
                        let result = registry.select(id).map(|d| d.id);

                        if processed == Some(true) {
                            prop_assert_eq!(result, Ok(id));
                            prop_assert_eq!(registry.active_id(), Some(id));
                        } else {
                            prop_assert!(result.is_err());
                            prop_assert_eq!(registry.active_id(), before);
                        }
                    }
                }

                prop_assert!(registry.selectable().all(|d| d.processed));
                prop_assert_eq!(
                    registry.selectable().count(),
                    registry.documents().iter().filter(|d| d.processed).count()
                );
                prop_assert_eq!(registry.active_id().is_some(), registry.active().is_some());
            }
        }
    }
}
