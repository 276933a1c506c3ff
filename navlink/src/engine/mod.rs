//! Cross-panel linking reconciliation.
//!
//! A [`ChartLinker`] lives in each window and reacts to that window's chart
//! panel lifecycle. All windows share one [`LinkingHub`]: the three linking
//! relations plus the collaborators the algorithms consult.
//!
//! ```text
//!   deduction opened ───────────────► make_default_links
//!   deduction reloaded ─► prune ────► make_default_links
//!   deduction closed ───► prune
//!   pair newly undefined ─► repair ─► make_default_links
//! ```

mod defaults;
mod prune;
mod repair;
pub mod sections;

pub use sections::DocumentSections;

use crate::config::LinkingConfig;
use crate::director::PanelDirector;
use crate::error::{LinkingError, LinkingResult};
use crate::hosting::DocumentHosting;
use crate::recency::RecencyOracle;
use crate::registry::{ChartRegistry, ForestChange};
use crate::relation::{EventBus, LinkingRelation};
use crate::types::{
    DisplayCommand, DocId, GotoSel, GroupEvent, HoverAction, Libpath, LinkTriple, NavigationInfo,
    PanelId,
};
use crate::window::{TripleAggregator, WindowGroup};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Collaborators shared by every window's linker.
#[derive(Clone)]
pub struct LinkingHub {
    /// L_C: chart panel, document id -> document panels.
    pub charts: Arc<dyn LinkingRelation<DocId>>,
    /// L_D: document panel, deduction path -> chart panels.
    pub documents: Arc<dyn LinkingRelation<Libpath>>,
    /// L_N: notes panel, document id -> document panels. Read only here.
    pub notes: Arc<dyn LinkingRelation<DocId>>,
    pub triples: Arc<dyn TripleAggregator>,
    pub hosting: Arc<dyn DocumentHosting>,
    pub recency: Arc<dyn RecencyOracle>,
    pub director: Arc<dyn PanelDirector>,
    pub group: Arc<WindowGroup>,
    pub sections: Arc<DocumentSections>,
    pub events: EventBus,
}

/// Links installed by one default-link pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub forward: Vec<LinkTriple<DocId>>,
    pub reverse: Vec<LinkTriple<Libpath>>,
    /// Referenced documents with no hosting panel.
    pub unhosted: Vec<DocId>,
}

impl LinkReport {
    /// True when the pass mutated no relation.
    pub fn is_noop(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }
}

/// Effects of one close/reload pruning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Documents whose L_C pair was dropped for the panel.
    pub dropped_documents: Vec<DocId>,
    pub forward_removed: usize,
    pub reverse_removed: usize,
    /// Document panels asked to reload highlights.
    pub highlight_reloads: Vec<PanelId>,
}

/// A click on a node in a chart panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeClick {
    pub nodepath: Libpath,
    pub deducpath: Libpath,
    pub doc_id: Option<DocId>,
    /// Alt held: navigate without scrolling the highlight into view.
    pub alt_key: bool,
}

pub struct ChartLinker {
    registry: Arc<ChartRegistry>,
    hub: LinkingHub,
    config: Arc<LinkingConfig>,
}

impl ChartLinker {
    pub fn new(registry: Arc<ChartRegistry>, hub: LinkingHub, config: Arc<LinkingConfig>) -> Self {
        Self {
            registry,
            hub,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ChartRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &LinkingHub {
        &self.hub
    }

    pub async fn on_deduction_opened(
        &self,
        deducpath: &Libpath,
        panel: &PanelId,
    ) -> LinkingResult<LinkReport> {
        self.make_default_links(deducpath, panel).await
    }

    pub async fn on_deduction_reloaded(
        &self,
        deducpath: &Libpath,
        panel: &PanelId,
    ) -> LinkingResult<(PruneReport, LinkReport)> {
        let pruned = self
            .update_linking_for_closed_or_reloaded(deducpath, panel, true)
            .await?;
        let linked = self.make_default_links(deducpath, panel).await?;
        Ok((pruned, linked))
    }

    pub async fn on_deduction_closed(
        &self,
        deducpath: &Libpath,
        panel: &PanelId,
    ) -> LinkingResult<PruneReport> {
        self.update_linking_for_closed_or_reloaded(deducpath, panel, false)
            .await
    }

    /// Drive linking for one forest update, after the registry reflects it.
    ///
    /// Truly closed paths are pruned first, then reloaded ones are pruned and
    /// relinked, then newly opened ones are linked.
    pub async fn note_forest_changes(
        &self,
        panel: &PanelId,
        change: &ForestChange,
    ) -> LinkingResult<()> {
        for path in &change.truly_closed {
            self.on_deduction_closed(path, panel).await?;
        }
        for path in &change.reloaded {
            self.on_deduction_reloaded(path, panel).await?;
        }
        for path in &change.newly_opened {
            self.on_deduction_opened(path, panel).await?;
        }
        Ok(())
    }

    /// Document panels a chart panel drives for `doc`.
    pub async fn query_navigation_target(
        &self,
        panel: &PanelId,
        doc: &DocId,
    ) -> LinkingResult<BTreeSet<PanelId>> {
        self.hub.charts.get(panel, doc).await
    }

    /// Chart panels a document panel drives for `deducpath`.
    pub async fn locate_targets(
        &self,
        doc_panel: &PanelId,
        deducpath: &Libpath,
    ) -> LinkingResult<BTreeSet<PanelId>> {
        self.hub.documents.get(doc_panel, deducpath).await
    }

    /// Send every linked document panel to the clicked node's highlight.
    ///
    /// Returns the panels navigated.
    pub async fn navigate_from_node(
        &self,
        panel: &PanelId,
        click: &NodeClick,
    ) -> LinkingResult<Vec<PanelId>> {
        let Some(doc) = &click.doc_id else {
            return Ok(Vec::new());
        };
        if !doc.as_str().starts_with(&self.config.navigable_doc_prefix) {
            debug!("[ChartLinker] document {} is not navigable", doc);
            return Ok(Vec::new());
        }

        let info = NavigationInfo {
            highlight_id: format!("{}:{}", click.deducpath, click.nodepath),
            gotosel: if click.alt_key {
                GotoSel::Never
            } else {
                GotoSel::Always
            },
        };
        let mut navigated = Vec::new();
        for w in self.hub.charts.get(panel, doc).await? {
            let command = DisplayCommand::Navigate {
                panel: w.clone(),
                info: info.clone(),
            };
            if self.dispatch(command).await? {
                navigated.push(w);
            }
        }
        Ok(navigated)
    }

    /// Tell every window which panels a hover would navigate.
    pub async fn announce_hover(
        &self,
        panel: &PanelId,
        doc: &DocId,
        action: HoverAction,
    ) -> LinkingResult<Vec<PanelId>> {
        let panels: Vec<PanelId> = self.hub.charts.get(panel, doc).await?.into_iter().collect();
        self.hub.group.groupcast(GroupEvent::IntentionToNavigate {
            action,
            source: panel.clone(),
            panels: panels.clone(),
        })?;
        Ok(panels)
    }

    /// Share a forest coloring with the other windows of the group.
    pub fn announce_coloring(
        &self,
        panel: &PanelId,
        gid: Option<String>,
        request: serde_json::Value,
    ) -> LinkingResult<()> {
        let event = GroupEvent::ForestColoring {
            gid,
            uuid: panel.clone(),
            request,
        };
        match self.hub.group.groupcast(event) {
            Ok(_) => Ok(()),
            // Colorings replayed while a window restores its panels arrive
            // before the group handshake completes.
            Err(LinkingError::NoGroup) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Deliver a display command; a vanished recipient is skipped.
    ///
    /// Returns whether the command was delivered.
    async fn dispatch(&self, command: DisplayCommand) -> LinkingResult<bool> {
        match self.hub.director.dispatch(command).await {
            Ok(()) => Ok(true),
            Err(LinkingError::StaleReference(panel)) => {
                debug!("[ChartLinker] skipping vanished panel {}", panel);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn log_link_report(&self, deducpath: &Libpath, panel: &PanelId, report: &LinkReport) {
        if !report.is_noop() {
            info!(
                "[ChartLinker] {} in {}: {} forward, {} reverse link(s) installed",
                deducpath,
                panel,
                report.forward.len(),
                report.reverse.len()
            );
        }
    }
}
