//! Filename parsing for generated images.
//!
//! The image generator writes one file per image using the pattern
//! `<style>_image_<NN>_<YYYYMMDD>_<HHMMSS>.jpg`. The scanner and the caption
//! loader both need pieces of that name, so the parsing lives here:
//!
//! - `brutalist_image_03_20240301_101500.jpg` → sequence=3, date=2024-03-01, time=10:15:00
//! - `gothic_revival_image_12_20240301_090000.jpg` → sequence=12 (style may contain `_`)
//! - `render_20240301_090000.jpg` → sequence=None, date=2024-03-01
//! - `cover.jpg` → not a generated image
//!
//! Only the two trailing tokens are required. The token before the date is
//! the sequence number when it is numeric.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Result of parsing a generated image filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedName {
    /// 1-based sequence number within the day's batch for this style.
    pub sequence: Option<u32>,
    /// Generation timestamp embedded in the name.
    pub generated_at: NaiveDateTime,
}

impl GeneratedName {
    pub fn date(&self) -> NaiveDate {
        self.generated_at.date()
    }
}

/// Parse `<...>_<YYYYMMDD>_<HHMMSS>.<ext>`.
///
/// Returns `None` when the name has no extension, fewer than three
/// `_`-separated tokens, or trailing tokens that aren't a valid date/time.
pub fn parse_generated_name(filename: &str) -> Option<GeneratedName> {
    let (stem, _ext) = filename.rsplit_once('.')?;
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let date_token = parts[parts.len() - 2];
    let time_token = parts[parts.len() - 1];
    if date_token.len() != 8 || time_token.len() != 6 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_token, "%Y%m%d").ok()?;
    let time = NaiveTime::parse_from_str(time_token, "%H%M%S").ok()?;
    let sequence = parts[parts.len() - 3].parse::<u32>().ok();
    Some(GeneratedName {
        sequence,
        generated_at: NaiveDateTime::new(date, time),
    })
}

/// Sequence number of a generated image, if its name carries one.
pub fn sequence_number(filename: &str) -> Option<u32> {
    parse_generated_name(filename).and_then(|n| n.sequence)
}
