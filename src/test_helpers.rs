//! Shared test utilities.
//!
//! Builders for image records and on-disk fixtures: a generated-images tree
//! laid out the way the image generator writes it, plus caption files.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let images = write_images(tmp.path(), &[("brutalist", 3), ("gothic", 2)], fixture_day());
//! write_captions(tmp.path(), "brutalist", &["first", "second", "third"]);
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::ImageRecord;

/// The day all fixtures are generated on.
pub fn fixture_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

/// Noon on the fixture day.
pub fn fixture_time() -> NaiveDateTime {
    NaiveDateTime::new(fixture_day(), NaiveTime::from_hms_opt(12, 0, 0).unwrap())
}

/// Filename the generator would give image `seq` of `style` on `day`.
pub fn generated_filename(style: &str, seq: u32, day: NaiveDate) -> String {
    format!("{style}_image_{seq:02}_{}_1015{seq:02}.jpg", day.format("%Y%m%d"))
}

/// An in-memory record for image `seq` of `style` on the fixture day.
/// The path does not exist on disk.
pub fn record(style: &str, seq: u32) -> ImageRecord {
    let filename = generated_filename(style, seq, fixture_day());
    ImageRecord {
        path: format!("images/{style}/{filename}"),
        filename,
        style: style.to_string(),
        date: fixture_day(),
        size: 1024 + seq as u64,
    }
}

/// `n` records spread over a few styles, in a stable order.
pub fn records(n: u32) -> Vec<ImageRecord> {
    let styles = ["brutalist", "gothic", "bauhaus"];
    (0..n)
        .map(|i| record(styles[(i % 3) as usize], i / 3 + 1))
        .collect()
}

/// Create `root/images/<style>/...jpg` files for each `(style, count)`.
/// Returns the images directory.
pub fn write_images(root: &Path, styles: &[(&str, u32)], day: NaiveDate) -> PathBuf {
    let images_dir = root.join("images");
    for (style, count) in styles {
        let dir = images_dir.join(style);
        fs::create_dir_all(&dir).unwrap();
        for seq in 1..=*count {
            let name = generated_filename(style, seq, day);
            fs::write(dir.join(name), vec![0u8; 100 + seq as usize]).unwrap();
        }
    }
    images_dir
}

/// Write `root/captions/<style>_captions.txt`, one caption per line.
/// Returns the captions directory.
pub fn write_captions(root: &Path, style: &str, lines: &[&str]) -> PathBuf {
    let dir = root.join("captions");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{style}_captions.txt")), lines.join("\n")).unwrap();
    dir
}

/// Paths of a slice of records.
pub fn paths(records: &[ImageRecord]) -> Vec<&str> {
    records.iter().map(|r| r.path.as_str()).collect()
}
