//! Outbound display commands to panels.

use crate::error::{LinkingError, LinkingResult};
use crate::types::{DisplayCommand, PanelId};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Delivers display commands to whichever window hosts the recipient.
#[async_trait]
pub trait PanelDirector: Send + Sync {
    /// Fails with `StaleReference` when the recipient no longer exists.
    async fn dispatch(&self, command: DisplayCommand) -> LinkingResult<()>;
}

/// Director that records every delivered command.
#[derive(Default)]
pub struct RecordingDirector {
    delivered: Mutex<Vec<DisplayCommand>>,
    retired: Mutex<HashSet<PanelId>>,
}

impl RecordingDirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands to `panel` fail from now on.
    pub async fn retire(&self, panel: &PanelId) {
        self.retired.lock().await.insert(panel.clone());
    }

    pub async fn reinstate(&self, panel: &PanelId) {
        self.retired.lock().await.remove(panel);
    }

    pub async fn delivered(&self) -> Vec<DisplayCommand> {
        self.delivered.lock().await.clone()
    }

    /// Drain and return the commands delivered so far.
    pub async fn take(&self) -> Vec<DisplayCommand> {
        std::mem::take(&mut *self.delivered.lock().await)
    }
}

#[async_trait]
impl PanelDirector for RecordingDirector {
    async fn dispatch(&self, command: DisplayCommand) -> LinkingResult<()> {
        let recipient = command.recipient().clone();
        if self.retired.lock().await.contains(&recipient) {
            return Err(LinkingError::StaleReference(recipient));
        }
        self.delivered.lock().await.push(command);
        Ok(())
    }
}
