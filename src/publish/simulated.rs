//! Stand-in publisher for platforms without an API integration.

use super::{PostDraft, PublishError, Publisher};
use crate::types::Platform;
use tracing::info;

/// Logs each post instead of sending it anywhere.
#[derive(Debug, Clone)]
pub struct SimulatedPublisher {
    platform: Platform,
}

impl SimulatedPublisher {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl Publisher for SimulatedPublisher {
    fn publish(&mut self, draft: &PostDraft) -> Result<Option<String>, PublishError> {
        let file = draft
            .image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!(
            platform = self.platform.key(),
            post = draft.post_number,
            file = %file,
            caption_chars = draft.caption.chars().count(),
            "simulated post"
        );
        Ok(None)
    }
}
