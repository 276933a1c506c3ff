//! In-memory linking relation.
//!
//! A single authoritative store that every window calls into. Tuples are kept
//! in ordered maps so scans are deterministic.

use super::{EventBus, LinkingEvent, LinkingRelation};
use crate::error::LinkingResult;
use crate::types::{LinkKey, LinkTriple, PanelId, PartialKey};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::trace;

pub struct InMemoryLinkingMap<X: LinkKey> {
    name: String,
    entries: RwLock<BTreeMap<(PanelId, X), BTreeSet<PanelId>>>,
    events: Option<EventBus>,
}

impl<X: LinkKey> InMemoryLinkingMap<X> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
            events: None,
        }
    }

    /// Publish newly-undefined notifications on `events`.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of stored tuples.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(BTreeSet::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<X: LinkKey> LinkingRelation<X> for InMemoryLinkingMap<X> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, u: &PanelId, x: &X) -> LinkingResult<BTreeSet<PanelId>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(u.clone(), x.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn triples(&self, pattern: &PartialKey<X>) -> LinkingResult<Vec<LinkTriple<X>>> {
        let entries = self.entries.read().await;
        let mut out = Vec::new();
        for ((u, x), targets) in entries.iter() {
            for w in targets {
                if pattern.matches(u, x, w) {
                    out.push(LinkTriple::new(u.clone(), x.clone(), w.clone()));
                }
            }
        }
        Ok(out)
    }

    async fn add(&self, u: &PanelId, x: &X, w: &PanelId) -> LinkingResult<()> {
        let mut entries = self.entries.write().await;
        let inserted = entries
            .entry((u.clone(), x.clone()))
            .or_default()
            .insert(w.clone());
        if inserted {
            trace!("[{}] add ({}, {}) -> {}", self.name, u, x, w);
        }
        Ok(())
    }

    async fn remove_triples(
        &self,
        pattern: &PartialKey<X>,
        do_not_relink: bool,
    ) -> LinkingResult<usize> {
        let mut emptied = Vec::new();
        let mut removed = 0;
        {
            let mut entries = self.entries.write().await;
            entries.retain(|(u, x), targets| {
                let before = targets.len();
                targets.retain(|w| !pattern.matches(u, x, w));
                removed += before - targets.len();
                if targets.is_empty() {
                    emptied.push((u.clone(), x.clone()));
                    false
                } else {
                    true
                }
            });
        }

        if removed > 0 {
            trace!("[{}] removed {} tuple(s)", self.name, removed);
        }
        if let Some(events) = &self.events {
            for (u, x) in emptied {
                events.publish(LinkingEvent::NewlyUndefinedAt {
                    relation: self.name.clone(),
                    source: u,
                    key: x.to_string(),
                    do_not_relink,
                });
            }
        }
        Ok(removed)
    }

    async fn domain(&self) -> LinkingResult<BTreeSet<PanelId>> {
        let entries = self.entries.read().await;
        Ok(entries.keys().map(|(u, _)| u.clone()).collect())
    }

    async fn range(&self) -> LinkingResult<BTreeSet<PanelId>> {
        let entries = self.entries.read().await;
        Ok(entries.values().flatten().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocId;

    fn p(id: &str) -> PanelId {
        PanelId::from(id)
    }

    fn d(id: &str) -> DocId {
        DocId::from(id)
    }

    #[tokio::test]
    async fn test_get_unknown_pair_is_empty() {
        let map = InMemoryLinkingMap::<DocId>::new("linking_charts");
        assert!(map.get(&p("c1"), &d("x")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let map = InMemoryLinkingMap::new("linking_charts");
        map.add(&p("c1"), &d("x"), &p("d1")).await.unwrap();
        map.add(&p("c1"), &d("x"), &p("d1")).await.unwrap();
        assert_eq!(map.len().await, 1);
        assert_eq!(
            map.get(&p("c1"), &d("x")).await.unwrap(),
            BTreeSet::from([p("d1")])
        );
    }

    #[tokio::test]
    async fn test_partial_key_queries() {
        let map = InMemoryLinkingMap::new("linking_charts");
        map.add(&p("c1"), &d("x"), &p("d1")).await.unwrap();
        map.add(&p("c1"), &d("y"), &p("d2")).await.unwrap();
        map.add(&p("c2"), &d("x"), &p("d3")).await.unwrap();

        let by_source = map.triples(&PartialKey::source(&p("c1"))).await.unwrap();
        assert_eq!(by_source.len(), 2);

        let by_key = map.triples(&PartialKey::key(&d("x"))).await.unwrap();
        let targets: Vec<_> = by_key.iter().map(|t| t.target.clone()).collect();
        assert_eq!(targets, vec![p("d1"), p("d3")]);

        assert_eq!(
            map.domain().await.unwrap(),
            BTreeSet::from([p("c1"), p("c2")])
        );
        assert_eq!(
            map.range().await.unwrap(),
            BTreeSet::from([p("d1"), p("d2"), p("d3")])
        );
    }

    #[tokio::test]
    async fn test_removal_of_last_target_notifies() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let map = InMemoryLinkingMap::new("linking_charts").with_events(bus);
        map.add(&p("c1"), &d("x"), &p("d1")).await.unwrap();
        map.add(&p("c1"), &d("x"), &p("d2")).await.unwrap();

        // Pair keeps a target: no notification.
        let n = map
            .remove_triples(&PartialKey::target(&p("d1")), false)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(rx.try_recv().is_err());

        let n = map
            .remove_triples(&PartialKey::target(&p("d2")), true)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkingEvent::NewlyUndefinedAt {
                relation: "linking_charts".to_string(),
                source: p("c1"),
                key: "x".to_string(),
                do_not_relink: true,
            }
        );
        assert!(map.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let map = InMemoryLinkingMap::new("linking_charts");
        map.add(&p("c1"), &d("x"), &p("d1")).await.unwrap();
        let pattern = PartialKey::source(&p("c1")).with_key(&d("x"));
        assert_eq!(map.remove_triples(&pattern, false).await.unwrap(), 1);
        assert_eq!(map.remove_triples(&pattern, false).await.unwrap(), 0);
    }
}
