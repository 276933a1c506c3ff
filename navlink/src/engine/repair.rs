//! Refill a chart panel's navigation target after the old one vanished.

use super::{ChartLinker, LinkReport};
use crate::error::LinkingResult;
use crate::relation::LinkingEvent;
use crate::types::{DocId, PanelId};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

impl ChartLinker {
    /// React to a relation pair losing its last target.
    ///
    /// Only chart-relation pairs whose panel lives in this window are
    /// repaired, and only when the remover did not ask to suppress it. The
    /// first local deduction of the panel still referencing the document is
    /// relinked.
    pub async fn on_newly_undefined(&self, event: &LinkingEvent) -> LinkingResult<Option<LinkReport>> {
        let LinkingEvent::NewlyUndefinedAt {
            relation,
            source,
            key,
            do_not_relink,
        } = event;

        if *do_not_relink || relation != &self.config.chart_relation {
            return Ok(None);
        }
        if !self.registry.contains(source) {
            return Ok(None);
        }

        let doc = DocId::from(key.clone());
        let deduction = self
            .registry
            .doc_ref_triples_local()
            .into_iter()
            .find(|t| &t.panel == source && t.document.as_ref() == Some(&doc))
            .map(|t| t.deduction);

        match deduction {
            Some(deducpath) => {
                info!(
                    "[ChartLinker] {} lost its target for {}; relinking via {}",
                    source, doc, deducpath
                );
                let report = self.make_default_links(&deducpath, source).await?;
                Ok(Some(report))
            }
            None => {
                debug!("[ChartLinker] {} no longer references {}", source, doc);
                Ok(None)
            }
        }
    }

    /// Entry point for callers reporting a vanished link target directly.
    pub async fn on_link_target_vanished(
        &self,
        relation: &str,
        panel: &PanelId,
        key: &str,
        suppress_repair: bool,
    ) -> LinkingResult<Option<LinkReport>> {
        let event = LinkingEvent::NewlyUndefinedAt {
            relation: relation.to_string(),
            source: panel.clone(),
            key: key.to_string(),
            do_not_relink: suppress_repair,
        };
        self.on_newly_undefined(&event).await
    }

    /// Consume relation notifications in a background task.
    ///
    /// The task stops once the linker is dropped and the next event arrives,
    /// or when the handle is aborted.
    pub fn spawn_repair_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.hub.events.subscribe();
        let linker = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("[ChartLinker] repair listener missed {} event(s)", missed);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(linker) = linker.upgrade() else {
                    break;
                };
                if let Err(e) = linker.on_newly_undefined(&event).await {
                    warn!("[ChartLinker] repair failed for {:?}: {}", event, e);
                }
            }
        })
    }
}
