//! Configuration for the linking engine.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use crate::error::{LinkingError, LinkingResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingConfig {
    /// Name of the chart -> document relation (L_C).
    pub chart_relation: String,
    /// Name of the document -> chart relation (L_D).
    pub document_relation: String,
    /// Name of the notes -> document relation (L_N).
    pub notes_relation: String,
    /// Only documents with this id prefix can be navigated from a node click.
    pub navigable_doc_prefix: String,
    /// Capacity of the relation notification channel.
    pub event_capacity: usize,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            chart_relation: "linking_charts".to_string(),
            document_relation: "linking_pdf".to_string(),
            notes_relation: "linking_notes".to_string(),
            navigable_doc_prefix: "pdffp:".to_string(),
            event_capacity: 1024,
        }
    }
}

impl LinkingConfig {
    pub fn from_toml_str(content: &str) -> LinkingResult<Self> {
        let config: LinkingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LinkingResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> LinkingResult<()> {
        let names = [
            &self.chart_relation,
            &self.document_relation,
            &self.notes_relation,
        ];
        if names.iter().any(|n| n.is_empty()) {
            return Err(LinkingError::Config(
                "relation names must not be empty".to_string(),
            ));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(LinkingError::Config(
                "relation names must be distinct".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(LinkingError::Config(
                "event_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
