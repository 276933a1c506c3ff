//! Cross-window aggregation and groupcast.
//!
//! Every window contributes its local reference triples; the group asks all
//! of them and concatenates the answers. A window that disappears while it is
//! being asked simply contributes nothing.

use crate::error::{LinkingError, LinkingResult};
use crate::registry::ChartRegistry;
use crate::types::{GroupEvent, RefTriple, WindowId};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::debug;

/// One window's view of its own chart panels.
#[async_trait]
pub trait TripleSource: Send + Sync {
    fn window_id(&self) -> &WindowId;

    async fn doc_ref_triples_local(&self) -> LinkingResult<Vec<RefTriple>>;
}

#[async_trait]
impl TripleSource for ChartRegistry {
    fn window_id(&self) -> &WindowId {
        self.window()
    }

    async fn doc_ref_triples_local(&self) -> LinkingResult<Vec<RefTriple>> {
        Ok(ChartRegistry::doc_ref_triples_local(self))
    }
}

/// Global view: the reference triples of every open window.
#[async_trait]
pub trait TripleAggregator: Send + Sync {
    async fn all_doc_ref_triples(&self) -> LinkingResult<Vec<RefTriple>>;
}

pub struct WindowGroup {
    peers: RwLock<Vec<(WindowId, Weak<dyn TripleSource>)>>,
    group_id: RwLock<Option<String>>,
    events: broadcast::Sender<GroupEvent>,
}

impl WindowGroup {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            peers: RwLock::new(Vec::new()),
            group_id: RwLock::new(None),
            events,
        }
    }

    /// Register a window. The group only keeps a weak handle.
    pub fn register(&self, source: &Arc<dyn TripleSource>) {
        let id = source.window_id().clone();
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        peers.retain(|(w, _)| w != &id);
        peers.push((id, Arc::downgrade(source)));
    }

    pub fn unregister(&self, window: &WindowId) {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        peers.retain(|(w, _)| w != window);
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        peers.iter().map(|(w, _)| w.clone()).collect()
    }

    /// Complete the group handshake; groupcasts fail until this happens.
    pub fn join(&self, group_id: impl Into<String>) {
        let mut id = self.group_id.write().unwrap_or_else(PoisonError::into_inner);
        *id = Some(group_id.into());
    }

    pub fn group_id(&self) -> Option<String> {
        self.group_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GroupEvent> {
        self.events.subscribe()
    }

    /// Deliver `event` to every subscribed window; returns the receiver count.
    pub fn groupcast(&self, event: GroupEvent) -> LinkingResult<usize> {
        if self.group_id().is_none() {
            return Err(LinkingError::NoGroup);
        }
        Ok(self.events.send(event).unwrap_or(0))
    }
}

impl Default for WindowGroup {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl TripleAggregator for WindowGroup {
    async fn all_doc_ref_triples(&self) -> LinkingResult<Vec<RefTriple>> {
        let sources: Vec<(WindowId, Option<Arc<dyn TripleSource>>)> = {
            let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
            peers
                .iter()
                .map(|(id, weak)| (id.clone(), weak.upgrade()))
                .collect()
        };

        let calls = sources.iter().map(|(id, source)| async move {
            match source {
                Some(source) => source.doc_ref_triples_local().await,
                None => Err(LinkingError::WindowGone(id.clone())),
            }
        });

        let mut triples = Vec::new();
        for result in join_all(calls).await {
            match result {
                Ok(batch) => triples.extend(batch),
                Err(LinkingError::WindowGone(id)) => {
                    debug!("[WindowGroup] window {} went away during broadcast", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(triples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocId, Libpath, PanelId};

    struct Vanishing(WindowId);

    #[async_trait]
    impl TripleSource for Vanishing {
        fn window_id(&self) -> &WindowId {
            &self.0
        }

        async fn doc_ref_triples_local(&self) -> LinkingResult<Vec<RefTriple>> {
            Err(LinkingError::WindowGone(self.0.clone()))
        }
    }

    struct Broken(WindowId);

    #[async_trait]
    impl TripleSource for Broken {
        fn window_id(&self) -> &WindowId {
            &self.0
        }

        async fn doc_ref_triples_local(&self) -> LinkingResult<Vec<RefTriple>> {
            Err(LinkingError::remote(self.0.as_str(), "boom"))
        }
    }

    fn registry(window: &str, panel: &str, deduc: &str, doc: &str) -> Arc<ChartRegistry> {
        let reg = Arc::new(ChartRegistry::new(WindowId::from(window)));
        let panel = PanelId::from(panel);
        reg.add_panel(panel.clone());
        reg.open_deduction(&panel, Libpath::from(deduc), vec![DocId::from(doc)])
            .unwrap();
        reg
    }

    #[tokio::test]
    async fn test_concatenates_all_windows() {
        let group = WindowGroup::default();
        let w1: Arc<dyn TripleSource> = registry("w1", "c1", "a.Pf", "pdffp:1");
        let w2: Arc<dyn TripleSource> = registry("w2", "c2", "b.Pf", "pdffp:2");
        group.register(&w1);
        group.register(&w2);

        let triples = group.all_doc_ref_triples().await.unwrap();
        let panels: Vec<_> = triples.iter().map(|t| t.panel.as_str()).collect();
        assert_eq!(panels, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_dropped_and_vanishing_windows_are_skipped() {
        let group = WindowGroup::default();
        let w1: Arc<dyn TripleSource> = registry("w1", "c1", "a.Pf", "pdffp:1");
        let gone: Arc<dyn TripleSource> = Arc::new(Vanishing(WindowId::from("w2")));
        group.register(&w1);
        group.register(&gone);
        {
            let dropped: Arc<dyn TripleSource> = registry("w3", "c3", "c.Pf", "pdffp:3");
            group.register(&dropped);
        }

        let triples = group.all_doc_ref_triples().await.unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].panel, PanelId::from("c1"));
    }

    #[tokio::test]
    async fn test_other_failures_propagate() {
        let group = WindowGroup::default();
        let broken: Arc<dyn TripleSource> = Arc::new(Broken(WindowId::from("w1")));
        group.register(&broken);
        let err = group.all_doc_ref_triples().await.unwrap_err();
        assert!(matches!(err, LinkingError::Remote { .. }));
    }

    #[test]
    fn test_groupcast_requires_group() {
        let group = WindowGroup::default();
        let event = GroupEvent::IntentionToNavigate {
            action: crate::types::HoverAction::Hide,
            source: PanelId::from("c1"),
            panels: vec![],
        };
        assert_eq!(group.groupcast(event.clone()), Err(LinkingError::NoGroup));

        group.join("g-1");
        let mut rx = group.subscribe();
        assert_eq!(group.groupcast(event.clone()), Ok(1));
        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
