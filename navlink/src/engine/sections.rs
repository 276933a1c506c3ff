//! Per-document mutual exclusion for default-link installation.
//!
//! Choosing the canonical reverse link for a document is check-then-add; two
//! passes over the same document must not interleave between the check and
//! the add. Passes over different documents run freely.

use crate::types::DocId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct DocumentSections {
    locks: Mutex<HashMap<DocId, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one document's section.
pub type SectionGuard = OwnedMutexGuard<()>;

impl DocumentSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enter(&self, doc: &DocId) -> SectionGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Nobody holds or waits on a lock whose only owner is the map.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(doc.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Documents with a section currently held or awaited.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}
