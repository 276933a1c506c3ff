//! Pruning after a deduction is closed or reloaded in a chart panel.

use super::{ChartLinker, PruneReport};
use crate::error::LinkingResult;
use crate::types::{DisplayCommand, DocId, Libpath, PanelId, PartialKey};
use std::collections::BTreeSet;
use tracing::debug;

impl ChartLinker {
    /// Handle deduction `deducpath` having been closed, or reloaded, in chart
    /// panel `uuid` of this window. The registry must already reflect it.
    pub async fn update_linking_for_closed_or_reloaded(
        &self,
        deducpath: &Libpath,
        uuid: &PanelId,
        reloaded: bool,
    ) -> LinkingResult<PruneReport> {
        let mut report = PruneReport::default();

        // Documents still referenced anywhere in the panel, and documents
        // referenced by the (rebuilt) deduction.
        let mut still_in_panel: BTreeSet<DocId> = BTreeSet::new();
        let mut in_deduction: BTreeSet<DocId> = BTreeSet::new();
        for t in self.registry.doc_ref_triples_local() {
            if let Some(d) = t.document {
                if &t.deduction == deducpath {
                    in_deduction.insert(d.clone());
                }
                if &t.panel == uuid {
                    still_in_panel.insert(d);
                }
            }
        }

        // L_C pairs of the panel whose document it no longer references.
        let dangling: BTreeSet<DocId> = self
            .hub
            .charts
            .triples(&PartialKey::source(uuid))
            .await?
            .into_iter()
            .filter(|t| !still_in_panel.contains(&t.key))
            .map(|t| t.key)
            .collect();

        for x in dangling {
            let pattern = PartialKey::source(uuid).with_key(&x);
            report.forward_removed += self.hub.charts.remove_triples(&pattern, true).await?;
            report.dropped_documents.push(x);
        }

        if reloaded {
            let hosting = self.hub.hosting.hosting_map().await?;
            for (d, hosts) in hosting {
                if in_deduction.contains(&d) {
                    // Highlights may have changed even though the link did not.
                    // Panels without a link are handled by make_default_links.
                    for w in hosts {
                        if self.hub.documents.get(&w, deducpath).await?.is_empty() {
                            continue;
                        }
                        let delivered = self
                            .dispatch(DisplayCommand::LoadHighlights {
                                doc_panel: w.clone(),
                                chart_panel: uuid.clone(),
                                accept_from: vec![deducpath.clone()],
                                link_to: Vec::new(),
                                reload: true,
                            })
                            .await?;
                        if delivered {
                            report.highlight_reloads.push(w);
                        }
                    }
                } else {
                    // The rebuilt deduction no longer needs this document.
                    for w in hosts {
                        let pattern = PartialKey::source(&w).with_key(deducpath);
                        report.reverse_removed +=
                            self.hub.documents.remove_triples(&pattern, false).await?;
                    }
                }
            }
        } else {
            // The panel must no longer be a navigation target for the deduction.
            let pattern = PartialKey::key(deducpath).with_target(uuid);
            report.reverse_removed += self.hub.documents.remove_triples(&pattern, false).await?;
        }

        debug!(
            "[ChartLinker] pruned {} in {} (reloaded={}): {:?}",
            deducpath, uuid, reloaded, report
        );
        Ok(report)
    }
}
