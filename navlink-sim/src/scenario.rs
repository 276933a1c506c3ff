//! Scenario files: an optional `[linking]` table and a list of `[[step]]`s
//! replayed in order against a [`Board`].

use anyhow::Context;
use navlink::{Board, DocId, HoverAction, Libpath, LinkingConfig, NodeClick, PanelId, WindowId};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub linking: Option<LinkingConfig>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    OpenWindow {
        window: WindowId,
    },
    CloseWindow {
        window: WindowId,
    },
    OpenChart {
        window: WindowId,
        panel: PanelId,
    },
    CloseChart {
        panel: PanelId,
    },
    OpenDeduction {
        panel: PanelId,
        deduction: Libpath,
        #[serde(default)]
        docs: Vec<DocId>,
    },
    Reload {
        panel: PanelId,
        deduction: Libpath,
        #[serde(default)]
        docs: Vec<DocId>,
    },
    CloseDeduction {
        panel: PanelId,
        deduction: Libpath,
    },
    OpenDoc {
        panel: PanelId,
        doc: DocId,
    },
    CloseDoc {
        panel: PanelId,
    },
    LinkNotes {
        notes: PanelId,
        doc: DocId,
        target: PanelId,
    },
    Activate {
        panel: PanelId,
    },
    Click {
        panel: PanelId,
        deduction: Libpath,
        node: Libpath,
        doc: Option<DocId>,
        #[serde(default)]
        alt: bool,
    },
    Hover {
        panel: PanelId,
        doc: DocId,
        #[serde(default)]
        hide: bool,
    },
    JoinGroup {
        group: String,
    },
    Settle,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse scenario: {}", e))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file '{}'", path.display()))?;
        Self::from_toml_str(&content)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLog {
    pub steps: usize,
    pub repairs: usize,
}

/// Replay `steps`; with `auto_settle`, pending repairs run after every step.
pub async fn run(board: &mut Board, steps: &[Step], auto_settle: bool) -> anyhow::Result<RunLog> {
    let mut log = RunLog::default();
    for (index, step) in steps.iter().enumerate() {
        debug!("[Sim] step {}: {:?}", index, step);
        apply(board, step, &mut log)
            .await
            .with_context(|| format!("step {} ({:?}) failed", index, step))?;
        if auto_settle {
            log.repairs += board.settle().await?;
        }
        log.steps += 1;
    }
    info!(
        "[Sim] replayed {} step(s), {} repair(s)",
        log.steps, log.repairs
    );
    Ok(log)
}

async fn apply(board: &mut Board, step: &Step, log: &mut RunLog) -> anyhow::Result<()> {
    match step {
        Step::OpenWindow { window } => {
            board.open_window(window.clone());
        }
        Step::CloseWindow { window } => board.close_window(window).await?,
        Step::OpenChart { window, panel } => board.open_chart_panel(window, panel.clone())?,
        Step::CloseChart { panel } => board.close_chart_panel(panel).await?,
        Step::OpenDeduction {
            panel,
            deduction,
            docs,
        } => {
            let report = board
                .open_deduction(panel, deduction.clone(), docs.clone())
                .await?;
            if !report.unhosted.is_empty() {
                info!("[Sim] {} references unhosted {:?}", deduction, report.unhosted);
            }
        }
        Step::Reload {
            panel,
            deduction,
            docs,
        } => {
            board
                .reload_deduction(panel, deduction.clone(), docs.clone())
                .await?;
        }
        Step::CloseDeduction { panel, deduction } => {
            board.close_deduction(panel, deduction).await?;
        }
        Step::OpenDoc { panel, doc } => {
            board.open_doc_panel(panel.clone(), doc.clone()).await?;
        }
        Step::CloseDoc { panel } => {
            board.close_doc_panel(panel).await?;
        }
        Step::LinkNotes { notes, doc, target } => board.link_notes(notes, doc, target).await?,
        Step::Activate { panel } => board.activate(panel),
        Step::Click {
            panel,
            deduction,
            node,
            doc,
            alt,
        } => {
            let click = NodeClick {
                nodepath: node.clone(),
                deducpath: deduction.clone(),
                doc_id: doc.clone(),
                alt_key: *alt,
            };
            let navigated = board.navigate(panel, &click).await?;
            info!("[Sim] click on {} navigated {:?}", node, navigated);
        }
        Step::Hover { panel, doc, hide } => {
            let action = if *hide {
                HoverAction::Hide
            } else {
                HoverAction::Show
            };
            board.hover(panel, doc, action).await?;
        }
        Step::JoinGroup { group } => board.group().join(group.clone()),
        Step::Settle => log.repairs += board.settle().await?,
    }
    Ok(())
}
