//! Shared types used by the scanner, allocator, store and posters.
//!
//! These types are serialized into the allocation state file and the post
//! summaries, so their field names are part of the on-disk format.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A social platform with its own posting pool.
///
/// The declaration order is the allocation order: chunks of the shuffled
/// daily images are handed out instagram → twitter → linkedin → patreon.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    Linkedin,
    Patreon,
}

impl Platform {
    /// All platforms in allocation order.
    pub const ALL: [Platform; 4] = [
        Platform::Instagram,
        Platform::Twitter,
        Platform::Linkedin,
        Platform::Patreon,
    ];

    /// Lowercase identifier, used in config keys and summary filenames.
    pub fn key(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Patreon => "patreon",
        }
    }

    /// Key of this platform's pool in the state file.
    pub fn pool_key(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram_pool",
            Platform::Twitter => "twitter_pool",
            Platform::Linkedin => "linkedin_pool",
            Platform::Patreon => "patreon_pool",
        }
    }

    /// Human-facing name.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter",
            Platform::Linkedin => "LinkedIn",
            Platform::Patreon => "Patreon",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Metadata for one generated image.
///
/// Created by the scanner, moved into exactly one pool by the allocator and
/// removed from that pool when a poster consumes it. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Path as discovered by the scanner (relative to the working directory
    /// when the images dir is relative). Identity key for `used_images`.
    pub path: String,
    pub filename: String,
    /// Name of the style directory the image lives in.
    pub style: String,
    /// Generation date embedded in the filename.
    pub date: NaiveDate,
    /// File size in bytes at scan time.
    pub size: u64,
}

/// Per-platform counts, indexed in allocation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlatformCounts {
    pub instagram: usize,
    pub twitter: usize,
    pub linkedin: usize,
    pub patreon: usize,
}

impl PlatformCounts {
    pub fn get(&self, platform: Platform) -> usize {
        match platform {
            Platform::Instagram => self.instagram,
            Platform::Twitter => self.twitter,
            Platform::Linkedin => self.linkedin,
            Platform::Patreon => self.patreon,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut usize {
        match platform {
            Platform::Instagram => &mut self.instagram,
            Platform::Twitter => &mut self.twitter,
            Platform::Linkedin => &mut self.linkedin,
            Platform::Patreon => &mut self.patreon,
        }
    }

    pub fn total(&self) -> usize {
        Platform::ALL.iter().map(|&p| self.get(p)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_order_is_allocation_order() {
        let keys: Vec<&str> = Platform::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(keys, vec!["instagram", "twitter", "linkedin", "patreon"]);
    }

    #[test]
    fn pool_keys_match_state_file_format() {
        assert_eq!(Platform::Linkedin.pool_key(), "linkedin_pool");
        assert_eq!(Platform::Patreon.pool_key(), "patreon_pool");
    }

    #[test]
    fn platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::Linkedin).unwrap();
        assert_eq!(json, "\"linkedin\"");
    }

    #[test]
    fn image_record_date_is_iso() {
        let record = ImageRecord {
            path: "images/brutalist/brutalist_image_01_20240301_101500.jpg".into(),
            filename: "brutalist_image_01_20240301_101500.jpg".into(),
            style: "brutalist".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            size: 2048,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["date"], "2024-03-01");
        assert_eq!(value["size"], 2048);
    }

    #[test]
    fn platform_counts_total_and_mutation() {
        let mut counts = PlatformCounts::default();
        *counts.get_mut(Platform::Twitter) += 3;
        *counts.get_mut(Platform::Patreon) += 2;
        assert_eq!(counts.get(Platform::Twitter), 3);
        assert_eq!(counts.total(), 5);
    }
}
