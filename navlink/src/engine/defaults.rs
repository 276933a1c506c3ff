//! Default-link installation for a deduction newly shown in a chart panel.

use super::{ChartLinker, LinkReport};
use crate::error::LinkingResult;
use crate::types::{DisplayCommand, DocId, Libpath, LinkTriple, PanelId, PartialKey};
use indexmap::IndexSet;
use std::collections::BTreeSet;
use tracing::debug;

impl ChartLinker {
    /// Establish default links for deduction `deducpath` in chart panel `uuid`.
    ///
    /// For every hosted document the deduction references, the panel gets a
    /// navigation target if it has none, and every panel hosting the document
    /// without a reverse link for `deducpath` is linked back to `uuid`.
    pub async fn make_default_links(
        &self,
        deducpath: &Libpath,
        uuid: &PanelId,
    ) -> LinkingResult<LinkReport> {
        let mut report = LinkReport::default();

        // Chart panels hosting the deduction, and the documents it references.
        let mut deduc_hosts: BTreeSet<PanelId> = BTreeSet::new();
        let mut referenced: IndexSet<DocId> = IndexSet::new();
        for t in self.hub.triples.all_doc_ref_triples().await? {
            if &t.deduction == deducpath {
                deduc_hosts.insert(t.panel);
                if let Some(d) = t.document {
                    referenced.insert(d);
                }
            }
        }

        if referenced.is_empty() {
            debug!("[ChartLinker] {} references no documents", deducpath);
            return Ok(report);
        }

        let notes_targets = self.hub.notes.range().await?;
        let hosting = self.hub.hosting.hosting_map().await?;

        for d in referenced {
            let hosts = match hosting.get(&d) {
                Some(hosts) if !hosts.is_empty() => hosts,
                _ => {
                    report.unhosted.push(d);
                    continue;
                }
            };

            let _section = self.hub.sections.enter(&d).await;

            if self.hub.charts.get(uuid, &d).await?.is_empty() {
                let choice = self
                    .choose_target(uuid, &d, hosts, &deduc_hosts, &notes_targets)
                    .await?;
                if let Some(v) = choice {
                    self.hub.charts.add(uuid, &d, &v).await?;
                    report.forward.push(LinkTriple::new(uuid.clone(), d.clone(), v));
                }
            }

            // With no reverse link yet, this occurrence is the first one
            // linked for the document, so it becomes the canonical target.
            for w in hosts {
                if self.hub.documents.get(w, deducpath).await?.is_empty() {
                    self.hub.documents.add(w, deducpath, uuid).await?;
                    report
                        .reverse
                        .push(LinkTriple::new(w.clone(), deducpath.clone(), uuid.clone()));
                    self.dispatch(DisplayCommand::LoadHighlights {
                        doc_panel: w.clone(),
                        chart_panel: uuid.clone(),
                        accept_from: vec![deducpath.clone()],
                        link_to: vec![deducpath.clone()],
                        reload: false,
                    })
                    .await?;
                }
            }
        }

        self.log_link_report(deducpath, uuid, &report);
        Ok(report)
    }

    /// Pick the document panel `uuid` should drive for `d`.
    ///
    /// Tiers, each consulted only when the previous one is empty:
    /// panels already driven by another host of the same deduction, panels
    /// driven by any chart panel, hosts driven by a notes panel, any host.
    /// Within a tier the most recently active panel wins.
    async fn choose_target(
        &self,
        uuid: &PanelId,
        d: &DocId,
        hosts: &[PanelId],
        deduc_hosts: &BTreeSet<PanelId>,
        notes_targets: &BTreeSet<PanelId>,
    ) -> LinkingResult<Option<PanelId>> {
        let existing = self.hub.charts.triples(&PartialKey::key(d)).await?;

        let same_deduction: Vec<PanelId> = existing
            .iter()
            .filter(|t| &t.source != uuid && deduc_hosts.contains(&t.source))
            .map(|t| t.target.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let any_chart: Vec<PanelId> = existing
            .iter()
            .map(|t| t.target.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let notes_driven: Vec<PanelId> = hosts
            .iter()
            .filter(|w| notes_targets.contains(*w))
            .cloned()
            .collect();

        for tier in [same_deduction, any_chart, notes_driven, hosts.to_vec()] {
            if !tier.is_empty() {
                return self.hub.recency.most_recently_active(&tier).await;
            }
        }
        Ok(None)
    }
}
