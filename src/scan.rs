//! Image inventory scanning.
//!
//! Finds the images generated on a given day. The generator writes one
//! directory per visual style:
//!
//! ```text
//! images/
//! ├── brutalist/
//! │   ├── brutalist_image_01_20240301_101500.jpg
//! │   └── brutalist_image_02_20240301_101532.jpg
//! └── gothic_revival/
//!     ├── gothic_revival_image_01_20240229_101500.jpg   # yesterday: skipped
//!     └── notes.txt                                     # not a .jpg: skipped
//! ```
//!
//! The date embedded in the filename is authoritative; file mtimes are
//! never consulted. Files that don't follow the naming convention are
//! skipped silently (debug log), and a missing images directory yields an
//! empty inventory with a warning. Scanning never fails.

use crate::naming::parse_generated_name;
use crate::types::ImageRecord;
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSION: &str = "jpg";

/// Collect the images under `images_dir/<style>/` generated on `today`.
///
/// Results are ordered by style, then filename.
pub fn scan_todays_images(images_dir: &Path, today: NaiveDate) -> Vec<ImageRecord> {
    if !images_dir.is_dir() {
        warn!(dir = %images_dir.display(), "images directory not found");
        return Vec::new();
    }

    let mut records = Vec::new();
    let walker = WalkDir::new(images_dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_jpeg(entry.path()) {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        let Some(parsed) = parse_generated_name(&filename) else {
            debug!(file = %filename, "skipping file without a generation timestamp");
            continue;
        };
        if parsed.date() != today {
            continue;
        }

        let style = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!(file = %entry.path().display(), error = %e, "could not read file metadata");
                continue;
            }
        };

        debug!(file = %filename, style = %style, "found today's image");
        records.push(ImageRecord {
            path: entry.path().to_string_lossy().to_string(),
            filename,
            style,
            date: parsed.date(),
            size,
        });
    }

    info!(count = records.len(), date = %today, "collected today's images");
    records
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(IMAGE_EXTENSION))
        .unwrap_or(false)
}
