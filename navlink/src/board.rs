//! The panel-management layer around the linking engine.
//!
//! A `Board` owns every window of one process group together with the shared
//! relations and collaborators, and plays the roles the engine treats as
//! external: chart and document panel lifecycle, notes linking, activation
//! tracking and delivery of relation notifications.

use crate::config::LinkingConfig;
use crate::director::RecordingDirector;
use crate::engine::{
    ChartLinker, DocumentSections, LinkReport, LinkingHub, NodeClick, PruneReport,
};
use crate::error::{LinkingError, LinkingResult};
use crate::hosting::DocPanelRegistry;
use crate::recency::ActivityTracker;
use crate::registry::{ChartRegistry, ForestChange};
use crate::relation::{EventBus, InMemoryLinkingMap, LinkingEvent, LinkingRelation};
use crate::types::{DocId, HoverAction, Libpath, LinkTriple, PanelId, PartialKey, WindowId};
use crate::window::{TripleSource, WindowGroup};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct Window {
    pub registry: Arc<ChartRegistry>,
    pub linker: Arc<ChartLinker>,
}

/// Serializable dump of the three relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    pub charts: Vec<LinkTriple<DocId>>,
    pub documents: Vec<LinkTriple<Libpath>>,
    pub notes: Vec<LinkTriple<DocId>>,
}

pub struct Board {
    config: Arc<LinkingConfig>,
    charts: Arc<InMemoryLinkingMap<DocId>>,
    documents: Arc<InMemoryLinkingMap<Libpath>>,
    notes: Arc<InMemoryLinkingMap<DocId>>,
    doc_panels: Arc<DocPanelRegistry>,
    activity: Arc<ActivityTracker>,
    director: Arc<RecordingDirector>,
    group: Arc<WindowGroup>,
    hub: LinkingHub,
    pending: Mutex<broadcast::Receiver<LinkingEvent>>,
    windows: IndexMap<WindowId, Window>,
}

impl Board {
    pub fn new(config: LinkingConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        let pending = Mutex::new(events.subscribe());

        let charts = Arc::new(
            InMemoryLinkingMap::new(config.chart_relation.clone()).with_events(events.clone()),
        );
        let documents = Arc::new(
            InMemoryLinkingMap::new(config.document_relation.clone()).with_events(events.clone()),
        );
        let notes = Arc::new(
            InMemoryLinkingMap::new(config.notes_relation.clone()).with_events(events.clone()),
        );
        let doc_panels = Arc::new(DocPanelRegistry::new());
        let activity = Arc::new(ActivityTracker::new());
        let director = Arc::new(RecordingDirector::new());
        let group = Arc::new(WindowGroup::new(config.event_capacity));

        let hub = LinkingHub {
            charts: charts.clone(),
            documents: documents.clone(),
            notes: notes.clone(),
            triples: group.clone(),
            hosting: doc_panels.clone(),
            recency: activity.clone(),
            director: director.clone(),
            group: group.clone(),
            sections: Arc::new(DocumentSections::new()),
            events,
        };

        Self {
            config: Arc::new(config),
            charts,
            documents,
            notes,
            doc_panels,
            activity,
            director,
            group,
            hub,
            pending,
            windows: IndexMap::new(),
        }
    }

    /// Replace shared collaborators (e.g. with instrumented relations).
    ///
    /// Only windows opened afterwards see the change.
    pub fn with_hub(mut self, configure: impl FnOnce(&mut LinkingHub)) -> Self {
        configure(&mut self.hub);
        self
    }

    pub fn config(&self) -> &LinkingConfig {
        &self.config
    }

    pub fn hub(&self) -> &LinkingHub {
        &self.hub
    }

    pub fn director(&self) -> &Arc<RecordingDirector> {
        &self.director
    }

    pub fn activity(&self) -> &Arc<ActivityTracker> {
        &self.activity
    }

    pub fn group(&self) -> &Arc<WindowGroup> {
        &self.group
    }

    pub fn open_window(&mut self, id: WindowId) -> Arc<ChartLinker> {
        if let Some(window) = self.windows.get(&id) {
            return window.linker.clone();
        }
        let registry = Arc::new(ChartRegistry::new(id.clone()));
        let source: Arc<dyn TripleSource> = registry.clone();
        self.group.register(&source);
        let linker = Arc::new(ChartLinker::new(
            registry.clone(),
            self.hub.clone(),
            self.config.clone(),
        ));
        info!("[Board] window {} opened", id);
        self.windows.insert(
            id,
            Window {
                registry,
                linker: linker.clone(),
            },
        );
        linker
    }

    /// Close a window along with every chart panel it hosts.
    pub async fn close_window(&mut self, id: &WindowId) -> LinkingResult<()> {
        let panels = self.window(id)?.registry.panel_ids();
        for panel in panels {
            self.close_chart_panel(&panel).await?;
        }
        self.group.unregister(id);
        self.windows.shift_remove(id);
        info!("[Board] window {} closed", id);
        Ok(())
    }

    pub fn window(&self, id: &WindowId) -> LinkingResult<&Window> {
        self.windows
            .get(id)
            .ok_or_else(|| LinkingError::UnknownWindow(id.clone()))
    }

    pub fn windows(&self) -> impl Iterator<Item = (&WindowId, &Window)> {
        self.windows.iter()
    }

    /// The window hosting chart panel `panel`.
    pub fn window_of(&self, panel: &PanelId) -> LinkingResult<&Window> {
        self.windows
            .values()
            .find(|w| w.registry.contains(panel))
            .ok_or_else(|| LinkingError::UnknownPanel(panel.clone()))
    }

    pub fn open_chart_panel(&self, window: &WindowId, panel: PanelId) -> LinkingResult<()> {
        self.window(window)?.registry.add_panel(panel.clone());
        self.activity.activate(&panel);
        Ok(())
    }

    /// Close a chart panel; its outgoing links go quietly, and document
    /// panels navigating to it lose that target.
    pub async fn close_chart_panel(&self, panel: &PanelId) -> LinkingResult<()> {
        let window = self.window_of(panel)?;
        let hosted = window.registry.remove_panel(panel);
        debug!("[Board] chart panel {} closed with {:?}", panel, hosted);
        self.charts
            .remove_triples(&PartialKey::source(panel), true)
            .await?;
        self.documents
            .remove_triples(&PartialKey::target(panel), false)
            .await?;
        self.activity.forget(panel);
        Ok(())
    }

    pub async fn open_deduction(
        &self,
        panel: &PanelId,
        deducpath: Libpath,
        docs: Vec<DocId>,
    ) -> LinkingResult<LinkReport> {
        let window = self.window_of(panel)?;
        window
            .registry
            .open_deduction(panel, deducpath.clone(), docs)?;
        self.activity.activate(panel);
        window.linker.on_deduction_opened(&deducpath, panel).await
    }

    pub async fn reload_deduction(
        &self,
        panel: &PanelId,
        deducpath: Libpath,
        docs: Vec<DocId>,
    ) -> LinkingResult<(PruneReport, LinkReport)> {
        let window = self.window_of(panel)?;
        window.registry.reload_deduction(panel, &deducpath, docs)?;
        window.linker.on_deduction_reloaded(&deducpath, panel).await
    }

    pub async fn close_deduction(
        &self,
        panel: &PanelId,
        deducpath: &Libpath,
    ) -> LinkingResult<PruneReport> {
        let window = self.window_of(panel)?;
        window.registry.close_deduction(panel, deducpath)?;
        window.linker.on_deduction_closed(deducpath, panel).await
    }

    /// Apply a whole forest update: `opened` maps paths to their references.
    pub async fn update_forest(
        &self,
        panel: &PanelId,
        opened: Vec<(Libpath, Vec<DocId>)>,
        closed: Vec<Libpath>,
    ) -> LinkingResult<ForestChange> {
        let window = self.window_of(panel)?;
        let opened_paths: Vec<Libpath> = opened.iter().map(|(p, _)| p.clone()).collect();
        let change = ForestChange::classify(&opened_paths, &closed);
        for path in &change.truly_closed {
            window.registry.close_deduction(panel, path)?;
        }
        for (path, docs) in opened {
            window.registry.open_deduction(panel, path, docs)?;
        }
        window.linker.note_forest_changes(panel, &change).await?;
        Ok(change)
    }

    /// Show `doc` in document panel `panel` and link chart panels that
    /// reference it.
    pub async fn open_doc_panel(&self, panel: PanelId, doc: DocId) -> LinkingResult<Vec<LinkReport>> {
        if self.doc_panels.document_of(&panel).await.is_some() {
            self.close_doc_panel(&panel).await?;
        }
        self.doc_panels.open_panel(panel.clone(), doc.clone()).await;
        self.director.reinstate(&panel).await;
        self.activity.activate(&panel);

        let mut reports = Vec::new();
        for window in self.windows.values() {
            let mut pairs: IndexSet<(PanelId, Libpath)> = IndexSet::new();
            for t in window.registry.doc_ref_triples_local() {
                if t.document.as_ref() == Some(&doc) {
                    pairs.insert((t.panel, t.deduction));
                }
            }
            for (u, s) in pairs {
                reports.push(window.linker.make_default_links(&s, &u).await?);
            }
        }
        Ok(reports)
    }

    /// Close a document panel. Chart panels that navigated it are notified
    /// through the chart relation; call [`Board::settle`] to run repairs.
    pub async fn close_doc_panel(&self, panel: &PanelId) -> LinkingResult<Option<DocId>> {
        let doc = self.doc_panels.close_panel(panel).await;
        self.director.retire(panel).await;
        self.activity.forget(panel);
        self.charts
            .remove_triples(&PartialKey::target(panel), false)
            .await?;
        self.documents
            .remove_triples(&PartialKey::source(panel), true)
            .await?;
        self.notes
            .remove_triples(&PartialKey::target(panel), true)
            .await?;
        Ok(doc)
    }

    /// Record that notes panel `notes_panel` navigates `doc_panel` for `doc`.
    pub async fn link_notes(
        &self,
        notes_panel: &PanelId,
        doc: &DocId,
        doc_panel: &PanelId,
    ) -> LinkingResult<()> {
        self.notes.add(notes_panel, doc, doc_panel).await
    }

    pub fn activate(&self, panel: &PanelId) {
        self.activity.activate(panel);
    }

    pub async fn navigate(&self, panel: &PanelId, click: &NodeClick) -> LinkingResult<Vec<PanelId>> {
        self.window_of(panel)?
            .linker
            .navigate_from_node(panel, click)
            .await
    }

    pub async fn hover(
        &self,
        panel: &PanelId,
        doc: &DocId,
        action: HoverAction,
    ) -> LinkingResult<Vec<PanelId>> {
        self.window_of(panel)?
            .linker
            .announce_hover(panel, doc, action)
            .await
    }

    /// Deliver pending relation notifications to every window's repair
    /// handler. Returns the number of repairs that ran.
    pub async fn settle(&self) -> LinkingResult<usize> {
        let mut pending = self.pending.lock().await;
        let mut repairs = 0;
        loop {
            let event = match pending.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("[Board] dropped {} relation notification(s)", missed);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            };
            for window in self.windows.values() {
                if window.linker.on_newly_undefined(&event).await?.is_some() {
                    repairs += 1;
                }
            }
        }
        Ok(repairs)
    }

    pub async fn snapshot(&self) -> LinkingResult<BoardSnapshot> {
        Ok(BoardSnapshot {
            charts: self.charts.triples(&PartialKey::any()).await?,
            documents: self.documents.triples(&PartialKey::any()).await?,
            notes: self.notes.triples(&PartialKey::any()).await?,
        })
    }
}
