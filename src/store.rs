//! Record-store collaborator interface.
//!
//! The production store is external to this crate (a whole-file
//! read/replace JSON store with no concurrent-writer protection, managed by
//! the host application). The pipeline only depends on the [`DocumentStore`]
//! trait; every operation is assumed atomic from this side — no
//! partial-write visibility.
//!
//! [`MemoryStore`] is the in-process reference implementation, used by tests
//! and small embedders.

use std::sync::Mutex;

use uuid::Uuid;

use crate::models::{Complaint, StoredDocument};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(String),

    #[error("document {0} not found in store")]
    MissingDocument(Uuid),

    #[error("internal store lock poisoned")]
    LockPoisoned,
}

/// Append-only document/complaint collections keyed by identifier.
pub trait DocumentStore: Send + Sync {
    fn find_document(&self, id: Uuid) -> Result<Option<StoredDocument>, StoreError>;

    /// All documents, in stable insertion order.
    fn list_documents(&self) -> Result<Vec<StoredDocument>, StoreError>;

    fn append_complaint(&self, complaint: &Complaint) -> Result<(), StoreError>;

    /// Record the complaint id on the document it was generated for.
    fn link_complaint(&self, document_id: Uuid, complaint_id: Uuid) -> Result<(), StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<S> {
    fn find_document(&self, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
        (**self).find_document(id)
    }

    fn list_documents(&self) -> Result<Vec<StoredDocument>, StoreError> {
        (**self).list_documents()
    }

    fn append_complaint(&self, complaint: &Complaint) -> Result<(), StoreError> {
        (**self).append_complaint(complaint)
    }

    fn link_complaint(&self, document_id: Uuid, complaint_id: Uuid) -> Result<(), StoreError> {
        (**self).link_complaint(document_id, complaint_id)
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    documents: Vec<StoredDocument>,
    complaints: Vec<Complaint>,
}

/// In-memory store. Insertion order is preserved, which is what gives
/// related-document selection its stable tie-break among equal dates.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document (normally the host application's upload path does this).
    pub fn add_document(&self, document: StoredDocument) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        inner.documents.push(document);
        Ok(())
    }

    pub fn complaints(&self) -> Result<Vec<Complaint>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.complaints.clone())
    }
}

impl DocumentStore for MemoryStore {
    fn find_document(&self, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.documents.iter().find(|d| d.id == id).cloned())
    }

    fn list_documents(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.documents.clone())
    }

    fn append_complaint(&self, complaint: &Complaint) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        inner.complaints.push(complaint.clone());
        Ok(())
    }

    fn link_complaint(&self, document_id: Uuid, complaint_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        let doc = inner
            .documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or(StoreError::MissingDocument(document_id))?;
        doc.complaint_ids.push(complaint_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_returns_added_document() {
        let store = MemoryStore::new();
        let doc = StoredDocument::new("текст");
        let id = doc.id;
        store.add_document(doc).unwrap();

        assert!(store.find_document(id).unwrap().is_some());
        assert!(store.find_document(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let store = MemoryStore::new();
        let first = StoredDocument::new("первый");
        let second = StoredDocument::new("второй");
        let ids = (first.id, second.id);
        store.add_document(first).unwrap();
        store.add_document(second).unwrap();

        let listed = store.list_documents().unwrap();
        assert_eq!(listed[0].id, ids.0);
        assert_eq!(listed[1].id, ids.1);
    }

    #[test]
    fn link_complaint_to_missing_document_errors() {
        let store = MemoryStore::new();
        let result = store.link_complaint(Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(result, Err(StoreError::MissingDocument(_))));
    }

    #[test]
    fn link_complaint_records_id_on_document() {
        let store = MemoryStore::new();
        let doc = StoredDocument::new("текст");
        let doc_id = doc.id;
        store.add_document(doc).unwrap();

        let complaint_id = Uuid::new_v4();
        store.link_complaint(doc_id, complaint_id).unwrap();

        let doc = store.find_document(doc_id).unwrap().unwrap();
        assert_eq!(doc.complaint_ids, vec![complaint_id]);
    }
}
