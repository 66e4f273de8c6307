use std::collections::HashMap;

use crate::models::{NoteBlock, NoteDocument, NoteKey};

/// In-memory "last known good" note documents for one session. No
/// persistence happens here; the sync queue owns durable writes.
#[derive(Debug, Clone, Default)]
pub struct NoteBuffer {
    documents: HashMap<NoteKey, NoteDocument>,
}

impl NoteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document, or an empty one stamped now if the key was never set.
    pub fn get(&self, key: &NoteKey) -> NoteDocument {
        self.documents
            .get(key)
            .cloned()
            .unwrap_or_else(NoteDocument::empty)
    }

    pub fn contains(&self, key: &NoteKey) -> bool {
        self.documents.contains_key(key)
    }

    pub fn set(&mut self, key: NoteKey, document: NoteDocument) {
        self.documents.insert(key, document);
    }

    /// Appends one block with a fresh modification stamp and returns the
    /// stored result.
    pub fn append_block(&mut self, key: NoteKey, block: NoteBlock) -> NoteDocument {
        let next = self.get(&key).appended(block);
        self.set(key, next.clone());
        next
    }

    /// Every touched document, ordered by key.
    pub fn entries(&self) -> Vec<(NoteKey, NoteDocument)> {
        let mut entries: Vec<(NoteKey, NoteDocument)> = self
            .documents
            .iter()
            .map(|(key, document)| (key.clone(), document.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
