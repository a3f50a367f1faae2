//! The allocation state document.
//!
//! One JSON file holds all four platform pools plus the registry of images
//! that were ever allocated:
//!
//! ```json
//! {
//!   "instagram_pool": [ { "path": "...", "filename": "...", "style": "...", "date": "2024-03-01", "size": 1234 } ],
//!   "twitter_pool": [],
//!   "linkedin_pool": [],
//!   "patreon_pool": [],
//!   "used_images": [ "images/brutalist/brutalist_image_01_20240301_101500.jpg" ],
//!   "last_updated": "2024-03-01T10:20:00.123456"
//! }
//! ```
//!
//! Any missing key deserializes to its empty default, so documents written
//! by older versions (or by posters that only knew about their own pool)
//! load cleanly. Fields are read leniently: a `null` or mistyped pool or
//! registry becomes empty, pool entries that are not image records are
//! dropped, and a `last_updated` that is `null`, carries a UTC offset or
//! does not parse at all is replaced. Only a document that is not JSON at
//! all loses its contents.
//!
//! `used_images` is a JSON array on disk and an insertion-ordered set in
//! memory. The conversion happens only in [`UsedImages`]'s serde impls.

use crate::types::{ImageRecord, Platform};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Current local time, the format `last_updated` is stored in.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Persistent queue state shared by the allocator and the posters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationState {
    #[serde(deserialize_with = "lenient_pool")]
    pub instagram_pool: Vec<ImageRecord>,
    #[serde(deserialize_with = "lenient_pool")]
    pub twitter_pool: Vec<ImageRecord>,
    #[serde(deserialize_with = "lenient_pool")]
    pub linkedin_pool: Vec<ImageRecord>,
    #[serde(deserialize_with = "lenient_pool")]
    pub patreon_pool: Vec<ImageRecord>,
    #[serde(deserialize_with = "lenient_used_images")]
    pub used_images: UsedImages,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_updated: NaiveDateTime,
}

impl Default for AllocationState {
    fn default() -> Self {
        Self::empty(now())
    }
}

impl AllocationState {
    /// Four empty pools and an empty registry.
    pub fn empty(at: NaiveDateTime) -> Self {
        Self {
            instagram_pool: Vec::new(),
            twitter_pool: Vec::new(),
            linkedin_pool: Vec::new(),
            patreon_pool: Vec::new(),
            used_images: UsedImages::default(),
            last_updated: at,
        }
    }

    pub fn pool(&self, platform: Platform) -> &[ImageRecord] {
        match platform {
            Platform::Instagram => &self.instagram_pool,
            Platform::Twitter => &self.twitter_pool,
            Platform::Linkedin => &self.linkedin_pool,
            Platform::Patreon => &self.patreon_pool,
        }
    }

    pub fn pool_mut(&mut self, platform: Platform) -> &mut Vec<ImageRecord> {
        match platform {
            Platform::Instagram => &mut self.instagram_pool,
            Platform::Twitter => &mut self.twitter_pool,
            Platform::Linkedin => &mut self.linkedin_pool,
            Platform::Patreon => &mut self.patreon_pool,
        }
    }

    /// Total images waiting across all pools.
    pub fn pending(&self) -> usize {
        Platform::ALL.iter().map(|&p| self.pool(p).len()).sum()
    }

    pub fn touch(&mut self, at: NaiveDateTime) {
        self.last_updated = at;
    }

    /// Same pools and registry, ignoring `last_updated`.
    pub fn same_contents(&self, other: &Self) -> bool {
        Platform::ALL.iter().all(|&p| self.pool(p) == other.pool(p))
            && self.used_images == other.used_images
    }
}

// =============================================================================
// Lenient field readers
// =============================================================================

/// Parse a stored timestamp: naive ISO 8601 with optional fraction, the same
/// with a space separator, or RFC 3339 with an offset (converted to local).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
    let raw = Value::deserialize(d)?;
    match raw.as_str().and_then(parse_timestamp) {
        Some(at) => Ok(at),
        None => {
            warn!(value = %raw, "unreadable last_updated, using current time");
            Ok(now())
        }
    }
}

fn lenient_pool<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ImageRecord>, D::Error> {
    let entries = match Value::deserialize(d)? {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!(value = %other, "pool is not a list, treating as empty");
            return Ok(Vec::new());
        }
    };
    let total = entries.len();
    let pool: Vec<ImageRecord> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if pool.len() < total {
        warn!(dropped = total - pool.len(), "skipped malformed pool entries");
    }
    Ok(pool)
}

fn lenient_used_images<'de, D: Deserializer<'de>>(d: D) -> Result<UsedImages, D::Error> {
    let entries = match Value::deserialize(d)? {
        Value::Array(entries) => entries,
        Value::Null => return Ok(UsedImages::default()),
        other => {
            warn!(value = %other, "used_images is not a list, treating as empty");
            return Ok(UsedImages::default());
        }
    };
    let total = entries.len();
    let used: UsedImages = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(path) => Some(path),
            _ => None,
        })
        .collect();
    if used.len() < total {
        warn!(skipped = total - used.len(), "skipped non-path or duplicate used_images entries");
    }
    Ok(used)
}

/// Registry of allocated image paths.
///
/// Behaves as a set for membership, but remembers insertion order so the
/// size cap can keep the most recent entries. Serialized as a plain JSON
/// array of paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct UsedImages {
    order: Vec<String>,
    index: HashSet<String>,
}

impl UsedImages {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains(path)
    }

    /// Insert a path. Returns `false` if it was already registered.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.index.contains(&path) {
            return false;
        }
        self.index.insert(path.clone());
        self.order.push(path);
        true
    }

    /// Paths in insertion order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Drop all but the `keep` most recently inserted paths.
    /// Returns how many were removed.
    pub fn retain_recent(&mut self, keep: usize) -> usize {
        if self.order.len() <= keep {
            return 0;
        }
        let removed = self.order.len() - keep;
        for path in self.order.drain(..removed) {
            self.index.remove(&path);
        }
        removed
    }
}

/// Set equality: order does not matter.
impl PartialEq for UsedImages {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl From<Vec<String>> for UsedImages {
    fn from(paths: Vec<String>) -> Self {
        let mut used = UsedImages::default();
        for path in paths {
            used.insert(path);
        }
        used
    }
}

impl From<UsedImages> for Vec<String> {
    fn from(used: UsedImages) -> Self {
        used.order
    }
}

impl<S: Into<String>> FromIterator<S> for UsedImages {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut used = UsedImages::default();
        for path in iter {
            used.insert(path);
        }
        used
    }
}
