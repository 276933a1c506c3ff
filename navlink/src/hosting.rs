//! Which document panels currently display which documents.

use crate::error::LinkingResult;
use crate::types::{DocId, PanelId};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Global document id -> hosting panels map.
#[async_trait]
pub trait DocumentHosting: Send + Sync {
    /// Only documents hosted by at least one panel appear in the map.
    async fn hosting_map(&self) -> LinkingResult<BTreeMap<DocId, Vec<PanelId>>>;
}

/// In-memory registry of document panels across all windows.
#[derive(Default)]
pub struct DocPanelRegistry {
    panels: RwLock<IndexMap<PanelId, DocId>>,
}

impl DocPanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `doc` in `panel`, replacing whatever the panel displayed.
    pub async fn open_panel(&self, panel: PanelId, doc: DocId) -> Option<DocId> {
        self.panels.write().await.insert(panel, doc)
    }

    /// Returns the document the panel displayed, if it existed.
    pub async fn close_panel(&self, panel: &PanelId) -> Option<DocId> {
        self.panels.write().await.shift_remove(panel)
    }

    pub async fn document_of(&self, panel: &PanelId) -> Option<DocId> {
        self.panels.read().await.get(panel).cloned()
    }
}

#[async_trait]
impl DocumentHosting for DocPanelRegistry {
    async fn hosting_map(&self) -> LinkingResult<BTreeMap<DocId, Vec<PanelId>>> {
        let panels = self.panels.read().await;
        let mut map: BTreeMap<DocId, Vec<PanelId>> = BTreeMap::new();
        for (panel, doc) in panels.iter() {
            map.entry(doc.clone()).or_default().push(panel.clone());
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hosting_map_groups_panels_by_document() {
        let reg = DocPanelRegistry::new();
        reg.open_panel(PanelId::from("d1"), DocId::from("pdffp:a")).await;
        reg.open_panel(PanelId::from("d2"), DocId::from("pdffp:b")).await;
        reg.open_panel(PanelId::from("d3"), DocId::from("pdffp:a")).await;

        let map = reg.hosting_map().await.unwrap();
        assert_eq!(
            map.get(&DocId::from("pdffp:a")).unwrap(),
            &vec![PanelId::from("d1"), PanelId::from("d3")]
        );

        reg.close_panel(&PanelId::from("d2")).await;
        let map = reg.hosting_map().await.unwrap();
        assert!(!map.contains_key(&DocId::from("pdffp:b")));
    }
}
