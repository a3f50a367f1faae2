//! Publishing posts to a platform.
//!
//! The [`Publisher`] trait is the seam between the pool consumer and the
//! outside world. The consumer builds a [`PostDraft`] per image and hands
//! it over; the publisher returns the remote post id when the platform
//! gives one.
//!
//! | Publisher | Platforms | Behavior |
//! |-----------|-----------|----------|
//! | [`SimulatedPublisher`] | all | logs the post, no network |
//! | [`PatreonPublisher`] | Patreon | JSON:API post + media upload over HTTPS |

pub mod patreon;
pub mod simulated;

pub use patreon::PatreonPublisher;
pub use simulated::SimulatedPublisher;

use crate::types::Platform;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Everything a publisher needs to post one image.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub platform: Platform,
    pub image_path: PathBuf,
    pub caption: String,
    /// Day the post goes out, used for post titles.
    pub date: NaiveDate,
    /// 1-based position within the run.
    pub post_number: usize,
}

/// A destination for posts.
pub trait Publisher {
    /// Check that the platform is reachable before taking images from the
    /// pool. A failure aborts the run with the pool untouched.
    fn check_connection(&mut self) -> Result<(), PublishError> {
        Ok(())
    }

    /// Publish one post. Returns the remote post id, if any.
    fn publish(&mut self, draft: &PostDraft) -> Result<Option<String>, PublishError>;
}
