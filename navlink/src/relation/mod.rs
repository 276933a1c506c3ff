//! Linking relations: keyed, set-valued maps `(panel, key) -> {panel}`.
//!
//! Three named instances coordinate neighbouring panel kinds:
//! - chart -> document (`DocId` keys): where a chart's highlight-follow goes
//! - document -> chart (`Libpath` keys): where a document's click-to-locate goes
//! - notes -> document (`DocId` keys): written by the notes subsystem, read here
//!
//! Calls are async because a relation may be served from another window.
//! Removing the last target of a `(source, key)` pair publishes
//! [`LinkingEvent::NewlyUndefinedAt`] on the [`EventBus`].

pub mod memory;

pub use memory::InMemoryLinkingMap;

use crate::error::LinkingResult;
use crate::types::{LinkKey, LinkTriple, PanelId, PartialKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::broadcast;

#[async_trait]
pub trait LinkingRelation<X: LinkKey>: Send + Sync {
    fn name(&self) -> &str;

    /// Current targets of `(u, x)`; empty for an unknown pair.
    async fn get(&self, u: &PanelId, x: &X) -> LinkingResult<BTreeSet<PanelId>>;

    /// All tuples matching the pattern, in `(source, key, target)` order.
    async fn triples(&self, pattern: &PartialKey<X>) -> LinkingResult<Vec<LinkTriple<X>>>;

    /// Idempotent insert.
    async fn add(&self, u: &PanelId, x: &X, w: &PanelId) -> LinkingResult<()>;

    /// Remove every matching tuple; returns how many were removed.
    ///
    /// `do_not_relink` is forwarded on the notifications this removal raises.
    async fn remove_triples(
        &self,
        pattern: &PartialKey<X>,
        do_not_relink: bool,
    ) -> LinkingResult<usize>;

    /// Sources holding at least one tuple.
    async fn domain(&self) -> LinkingResult<BTreeSet<PanelId>>;

    /// Targets of at least one tuple.
    async fn range(&self) -> LinkingResult<BTreeSet<PanelId>>;
}

/// Notification published by relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LinkingEvent {
    /// The pair `(source, key)` of `relation` lost its last target.
    NewlyUndefinedAt {
        relation: String,
        source: PanelId,
        key: String,
        do_not_relink: bool,
    },
}

/// Broadcast channel shared by all relations and all interested handlers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LinkingEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkingEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: LinkingEvent) {
        // No subscribers is fine: nobody is interested in repairs yet.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
