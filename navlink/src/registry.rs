//! Window-local registry of chart panels and the deductions they host.
//!
//! The rendering engine owns the real graph state; the registry only mirrors
//! what the engine needs: which deductions each chart panel hosts and which
//! documents each of those deductions references.

use crate::error::{LinkingError, LinkingResult};
use crate::types::{DocId, Libpath, PanelId, RefTriple, WindowId};
use indexmap::{IndexMap, IndexSet};
use std::sync::{PoisonError, RwLock};

/// Deductions hosted by one chart panel, in opening order.
///
/// `None` means the deduction references no document at all.
#[derive(Debug, Clone, Default)]
struct ChartPanel {
    deductions: IndexMap<Libpath, Option<IndexSet<DocId>>>,
}

pub struct ChartRegistry {
    window: WindowId,
    panels: RwLock<IndexMap<PanelId, ChartPanel>>,
}

fn doc_set(docs: Vec<DocId>) -> Option<IndexSet<DocId>> {
    if docs.is_empty() {
        None
    } else {
        Some(docs.into_iter().collect())
    }
}

impl ChartRegistry {
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            panels: RwLock::new(IndexMap::new()),
        }
    }

    pub fn window(&self) -> &WindowId {
        &self.window
    }

    pub fn add_panel(&self, panel: PanelId) {
        let mut panels = self.panels.write().unwrap_or_else(PoisonError::into_inner);
        panels.entry(panel).or_default();
    }

    /// Forget a chart panel; returns the deductions it hosted.
    pub fn remove_panel(&self, panel: &PanelId) -> Vec<Libpath> {
        let mut panels = self.panels.write().unwrap_or_else(PoisonError::into_inner);
        panels
            .shift_remove(panel)
            .map(|p| p.deductions.into_keys().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, panel: &PanelId) -> bool {
        let panels = self.panels.read().unwrap_or_else(PoisonError::into_inner);
        panels.contains_key(panel)
    }

    pub fn panel_ids(&self) -> Vec<PanelId> {
        let panels = self.panels.read().unwrap_or_else(PoisonError::into_inner);
        panels.keys().cloned().collect()
    }

    pub fn hosts(&self, panel: &PanelId, deduction: &Libpath) -> bool {
        let panels = self.panels.read().unwrap_or_else(PoisonError::into_inner);
        panels
            .get(panel)
            .is_some_and(|p| p.deductions.contains_key(deduction))
    }

    /// Record that `panel` now displays `deduction`, referencing `docs`.
    pub fn open_deduction(
        &self,
        panel: &PanelId,
        deduction: Libpath,
        docs: Vec<DocId>,
    ) -> LinkingResult<()> {
        let mut panels = self.panels.write().unwrap_or_else(PoisonError::into_inner);
        let entry = panels
            .get_mut(panel)
            .ok_or_else(|| LinkingError::UnknownPanel(panel.clone()))?;
        entry.deductions.insert(deduction, doc_set(docs));
        Ok(())
    }

    /// Returns whether the deduction was hosted.
    pub fn close_deduction(&self, panel: &PanelId, deduction: &Libpath) -> LinkingResult<bool> {
        let mut panels = self.panels.write().unwrap_or_else(PoisonError::into_inner);
        let entry = panels
            .get_mut(panel)
            .ok_or_else(|| LinkingError::UnknownPanel(panel.clone()))?;
        Ok(entry.deductions.shift_remove(deduction).is_some())
    }

    /// Replace a hosted deduction's references after a rebuild.
    pub fn reload_deduction(
        &self,
        panel: &PanelId,
        deduction: &Libpath,
        docs: Vec<DocId>,
    ) -> LinkingResult<()> {
        let mut panels = self.panels.write().unwrap_or_else(PoisonError::into_inner);
        let entry = panels
            .get_mut(panel)
            .ok_or_else(|| LinkingError::UnknownPanel(panel.clone()))?;
        // Re-inserting an existing key keeps its position.
        entry.deductions.insert(deduction.clone(), doc_set(docs));
        Ok(())
    }

    /// All `(panel, deduction, document)` triples visible in this window.
    ///
    /// One triple per referenced document, or a single triple with no
    /// document for a deduction referencing nothing.
    pub fn doc_ref_triples_local(&self) -> Vec<RefTriple> {
        let panels = self.panels.read().unwrap_or_else(PoisonError::into_inner);
        let mut triples = Vec::new();
        for (u, panel) in panels.iter() {
            for (s, docs) in panel.deductions.iter() {
                match docs {
                    Some(docs) => {
                        for d in docs {
                            triples.push(RefTriple::new(u.clone(), s.clone(), Some(d.clone())));
                        }
                    }
                    None => triples.push(RefTriple::new(u.clone(), s.clone(), None)),
                }
            }
        }
        triples
    }
}

/// A forest update split the way linking needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForestChange {
    pub newly_opened: Vec<Libpath>,
    pub reloaded: Vec<Libpath>,
    pub truly_closed: Vec<Libpath>,
}

impl ForestChange {
    /// A path both opened and closed in the same update was reloaded.
    pub fn classify(opened: &[Libpath], closed: &[Libpath]) -> Self {
        let mut change = ForestChange::default();
        for path in opened {
            if closed.contains(path) {
                change.reloaded.push(path.clone());
            } else {
                change.newly_opened.push(path.clone());
            }
        }
        for path in closed {
            if !change.reloaded.contains(path) {
                change.truly_closed.push(path.clone());
            }
        }
        change
    }

    pub fn is_empty(&self) -> bool {
        self.newly_opened.is_empty() && self.reloaded.is_empty() && self.truly_closed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ChartRegistry {
        let reg = ChartRegistry::new(WindowId::from("w1"));
        reg.add_panel(PanelId::from("c1"));
        reg.add_panel(PanelId::from("c2"));
        reg
    }

    #[test]
    fn test_triples_follow_enumeration_order() {
        let reg = registry();
        let c1 = PanelId::from("c1");
        let c2 = PanelId::from("c2");
        reg.open_deduction(
            &c1,
            Libpath::from("a.b.Thm1.Pf"),
            vec![DocId::from("pdffp:1"), DocId::from("pdffp:2")],
        )
        .unwrap();
        reg.open_deduction(&c2, Libpath::from("a.b.Thm2.Pf"), vec![])
            .unwrap();

        let triples = reg.doc_ref_triples_local();
        assert_eq!(
            triples,
            vec![
                RefTriple::new(
                    c1.clone(),
                    Libpath::from("a.b.Thm1.Pf"),
                    Some(DocId::from("pdffp:1"))
                ),
                RefTriple::new(
                    c1,
                    Libpath::from("a.b.Thm1.Pf"),
                    Some(DocId::from("pdffp:2"))
                ),
                RefTriple::new(c2, Libpath::from("a.b.Thm2.Pf"), None),
            ]
        );
    }

    #[test]
    fn test_open_on_unknown_panel_fails() {
        let reg = registry();
        let err = reg
            .open_deduction(&PanelId::from("nope"), Libpath::from("x"), vec![])
            .unwrap_err();
        assert_eq!(err, LinkingError::UnknownPanel(PanelId::from("nope")));
    }

    #[test]
    fn test_reload_replaces_references() {
        let reg = registry();
        let c1 = PanelId::from("c1");
        let s = Libpath::from("a.Pf");
        reg.open_deduction(&c1, s.clone(), vec![DocId::from("pdffp:1")])
            .unwrap();
        reg.reload_deduction(&c1, &s, vec![DocId::from("pdffp:9")])
            .unwrap();
        let docs: Vec<_> = reg
            .doc_ref_triples_local()
            .into_iter()
            .filter_map(|t| t.document)
            .collect();
        assert_eq!(docs, vec![DocId::from("pdffp:9")]);
    }

    #[test]
    fn test_classify_forest_change() {
        let a = Libpath::from("a");
        let b = Libpath::from("b");
        let c = Libpath::from("c");
        let change = ForestChange::classify(&[a.clone(), b.clone()], &[b.clone(), c.clone()]);
        assert_eq!(change.newly_opened, vec![a]);
        assert_eq!(change.reloaded, vec![b]);
        assert_eq!(change.truly_closed, vec![c]);
    }
}
