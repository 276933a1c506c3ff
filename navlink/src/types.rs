//! Identifiers, triples and the commands/events exchanged with panels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Process-wide panel identifier (valid across windows).
    PanelId
);
string_id!(WindowId);
string_id!(
    /// Opaque document identifier, e.g. `pdffp:<fingerprint>`.
    DocId
);
string_id!(
    /// Hierarchical path naming a deduction.
    Libpath
);

/// Secondary key of a linking relation.
pub trait LinkKey:
    Clone + Ord + Hash + fmt::Debug + fmt::Display + From<String> + Send + Sync + 'static
{
}

impl LinkKey for DocId {}
impl LinkKey for Libpath {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Chart,
    Document,
    Notes,
}

/// Observed fact: chart panel `panel` hosts `deduction`, which references
/// `document` (`None` when it references nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefTriple {
    pub panel: PanelId,
    pub deduction: Libpath,
    pub document: Option<DocId>,
}

impl RefTriple {
    pub fn new(panel: PanelId, deduction: Libpath, document: Option<DocId>) -> Self {
        Self {
            panel,
            deduction,
            document,
        }
    }
}

/// One tuple `(source, key) -> target` of a linking relation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkTriple<X> {
    pub source: PanelId,
    pub key: X,
    pub target: PanelId,
}

impl<X> LinkTriple<X> {
    pub fn new(source: PanelId, key: X, target: PanelId) -> Self {
        Self {
            source,
            key,
            target,
        }
    }
}

/// Query/removal pattern fixing any subset of `{source, key, target}`.
///
/// An empty pattern matches every tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialKey<X> {
    pub source: Option<PanelId>,
    pub key: Option<X>,
    pub target: Option<PanelId>,
}

impl<X> Default for PartialKey<X> {
    fn default() -> Self {
        Self {
            source: None,
            key: None,
            target: None,
        }
    }
}

impl<X: PartialEq + Clone> PartialKey<X> {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn source(u: &PanelId) -> Self {
        Self {
            source: Some(u.clone()),
            ..Self::default()
        }
    }

    pub fn key(x: &X) -> Self {
        Self {
            key: Some(x.clone()),
            ..Self::default()
        }
    }

    pub fn target(w: &PanelId) -> Self {
        Self {
            target: Some(w.clone()),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, x: &X) -> Self {
        self.key = Some(x.clone());
        self
    }

    pub fn with_target(mut self, w: &PanelId) -> Self {
        self.target = Some(w.clone());
        self
    }

    pub fn matches(&self, source: &PanelId, key: &X, target: &PanelId) -> bool {
        self.source.as_ref().map_or(true, |u| u == source)
            && self.key.as_ref().map_or(true, |x| x == key)
            && self.target.as_ref().map_or(true, |w| w == target)
    }
}

/// Whether a navigated document panel should scroll the highlight into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GotoSel {
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationInfo {
    pub highlight_id: String,
    pub gotosel: GotoSel,
}

/// Commands the engine issues to panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DisplayCommand {
    /// Ask a document panel to (re)load the highlights supplied by a chart panel.
    LoadHighlights {
        doc_panel: PanelId,
        chart_panel: PanelId,
        accept_from: Vec<Libpath>,
        link_to: Vec<Libpath>,
        reload: bool,
    },
    /// Drive a document panel to a highlight.
    Navigate { panel: PanelId, info: NavigationInfo },
}

impl DisplayCommand {
    /// The panel that receives the command.
    pub fn recipient(&self) -> &PanelId {
        match self {
            DisplayCommand::LoadHighlights { doc_panel, .. } => doc_panel,
            DisplayCommand::Navigate { panel, .. } => panel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverAction {
    Show,
    Hide,
}

/// Events groupcast to every window of the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GroupEvent {
    ForestColoring {
        gid: Option<String>,
        uuid: PanelId,
        request: serde_json::Value,
    },
    IntentionToNavigate {
        action: HoverAction,
        source: PanelId,
        panels: Vec<PanelId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_key_matching() {
        let u = PanelId::from("u1");
        let w = PanelId::from("w1");
        let x = DocId::from("pdffp:abc");

        assert!(PartialKey::<DocId>::any().matches(&u, &x, &w));
        assert!(PartialKey::source(&u).with_key(&x).matches(&u, &x, &w));
        assert!(!PartialKey::source(&w).matches(&u, &x, &w));
        assert!(PartialKey::key(&x).with_target(&w).matches(&u, &x, &w));
        assert!(!PartialKey::key(&DocId::from("pdffp:other")).matches(&u, &x, &w));
    }

    #[test]
    fn test_group_event_serializes_with_type_tag() {
        let event = GroupEvent::IntentionToNavigate {
            action: HoverAction::Show,
            source: PanelId::from("c1"),
            panels: vec![PanelId::from("d1")],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "intentionToNavigate");
        assert_eq!(json["action"], "show");
        assert_eq!(json["panels"][0], "d1");
    }
}
