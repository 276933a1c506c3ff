// navlink
// Cross-panel linking between chart panels (proof graphs grouped into
// deductions) and the document panels their nodes cite.

pub mod board;
pub mod config;
pub mod director;
pub mod engine;
pub mod error;
pub mod hosting;
pub mod recency;
pub mod registry;
pub mod relation;
pub mod types;
pub mod window;

pub use crate::board::{Board, BoardSnapshot};
pub use crate::config::LinkingConfig;
pub use crate::engine::{ChartLinker, LinkReport, LinkingHub, NodeClick, PruneReport};
pub use crate::error::{LinkingError, LinkingResult};
pub use crate::relation::{EventBus, InMemoryLinkingMap, LinkingEvent, LinkingRelation};
pub use crate::types::{
    DisplayCommand, DocId, GroupEvent, HoverAction, Libpath, LinkTriple, PanelId, PartialKey,
    RefTriple, WindowId,
};
