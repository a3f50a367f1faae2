//! One posting run for one platform.
//!
//! A [`PoolConsumer`] is configured per platform (run size, pacing, caption
//! profile) and drives a full run:
//!
//! ```text
//! check connection → load state → pop N from the pool
//!   → for each image: caption → publish → record (→ wait)
//!   → write posts/<platform>_posts_<stamp>.{json,txt} → save state
//! ```
//!
//! Runs never fail as a whole. Per-image problems (missing file, publish
//! error) are recorded as failed posts and the batch continues. Popped
//! images are not returned to the pool, failed or not.

use crate::caption::{CaptionProfile, load_base_caption};
use crate::config::Config;
use crate::consume::consume;
use crate::publish::{PostDraft, Publisher};
use crate::state::now;
use crate::store::{SaveOutcome, StateStore};
use crate::types::{ImageRecord, Platform};
use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PosterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Success,
    Failed,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Success => "success",
            PostStatus::Failed => "failed",
        }
    }
}

/// One entry of a post summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub platform: Platform,
    pub image_path: String,
    pub style: String,
    pub caption: String,
    pub timestamp: NaiveDateTime,
    pub status: PostStatus,
    pub post_number: usize,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a posting run did.
#[derive(Debug, Clone)]
pub struct ConsumptionReport {
    pub platform: Platform,
    pub requested: usize,
    pub posts: Vec<PostRecord>,
    /// JSON and text summary files, when written.
    pub summary_files: Option<(PathBuf, PathBuf)>,
    /// `None` when nothing was taken from the pool.
    pub save: Option<SaveOutcome>,
    /// Pool size after the run.
    pub remaining: usize,
    /// Set when the run stopped before touching the pool.
    pub aborted: Option<String>,
}

impl ConsumptionReport {
    fn new(platform: Platform, requested: usize) -> Self {
        Self {
            platform,
            requested,
            posts: Vec::new(),
            summary_files: None,
            save: None,
            remaining: 0,
            aborted: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.posts
            .iter()
            .filter(|p| p.status == PostStatus::Success)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.posts.len() - self.succeeded()
    }
}

/// Drains one platform pool.
#[derive(Debug, Clone)]
pub struct PoolConsumer {
    platform: Platform,
    count: usize,
    delay_secs: (f64, f64),
    captions_dir: PathBuf,
    posts_dir: PathBuf,
    profile: &'static CaptionProfile,
}

impl PoolConsumer {
    pub fn new(platform: Platform, config: &Config) -> Self {
        Self {
            platform,
            count: config.posting.for_platform(platform).count,
            delay_secs: config.posting.delay_range(platform),
            captions_dir: config.paths.captions_dir.clone(),
            posts_dir: config.paths.posts_dir.clone(),
            profile: CaptionProfile::for_platform(platform),
        }
    }

    /// Override the configured run size.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Run one posting batch. `started_at` dates the posts and names the
    /// summary files.
    pub fn run<P, R>(
        &self,
        store: &StateStore,
        publisher: &mut P,
        rng: &mut R,
        started_at: NaiveDateTime,
    ) -> ConsumptionReport
    where
        P: Publisher + ?Sized,
        R: Rng + ?Sized,
    {
        let platform = self.platform;
        let mut report = ConsumptionReport::new(platform, self.count);
        info!(platform = platform.key(), count = self.count, "starting posting run");

        if let Err(e) = publisher.check_connection() {
            error!(platform = platform.key(), error = %e, "connection check failed, pool left untouched");
            report.aborted = Some(e.to_string());
            return report;
        }

        let mut state = store.load();
        let batch = consume(&mut state, platform, self.count);
        if batch.is_empty() {
            report.remaining = state.pool(platform).len();
            return report;
        }

        let total = batch.len();
        for (i, image) in batch.iter().enumerate() {
            let post_number = i + 1;
            let record = self.post_one(image, post_number, publisher, rng, started_at);
            report.posts.push(record);

            if post_number < total {
                self.pause(rng);
            }
        }

        info!(
            platform = platform.key(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "posting run complete"
        );

        match write_post_summary(&self.posts_dir, platform, &report.posts, started_at) {
            Ok(files) => report.summary_files = Some(files),
            Err(e) => error!(platform = platform.key(), error = %e, "could not write post summary"),
        }

        report.save = Some(store.save(&mut state));
        report.remaining = state.pool(platform).len();
        report
    }

    fn post_one<P, R>(
        &self,
        image: &ImageRecord,
        post_number: usize,
        publisher: &mut P,
        rng: &mut R,
        started_at: NaiveDateTime,
    ) -> PostRecord
    where
        P: Publisher + ?Sized,
        R: Rng + ?Sized,
    {
        let path = PathBuf::from(&image.path);
        let mut record = PostRecord {
            platform: self.platform,
            image_path: image.path.clone(),
            style: image.style.clone(),
            caption: String::new(),
            timestamp: now(),
            status: PostStatus::Failed,
            post_number,
            file_size: image.size,
            post_id: None,
            error: None,
        };

        let size = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m.len(),
            _ => {
                error!(file = %image.path, "image file not found");
                record.error = Some(format!("image file not found: {}", image.path));
                return record;
            }
        };
        record.file_size = size;

        let base = load_base_caption(&self.captions_dir, image);
        record.caption = self.profile.format(&base, rng);

        let draft = PostDraft {
            platform: self.platform,
            image_path: path,
            caption: record.caption.clone(),
            date: started_at.date(),
            post_number,
        };
        match publisher.publish(&draft) {
            Ok(post_id) => {
                info!(
                    platform = self.platform.key(),
                    post = post_number,
                    file = %image.filename,
                    "posted image"
                );
                record.status = PostStatus::Success;
                record.post_id = post_id;
            }
            Err(e) => {
                error!(
                    platform = self.platform.key(),
                    post = post_number,
                    file = %image.filename,
                    error = %e,
                    "failed to post image"
                );
                record.error = Some(e.to_string());
            }
        }
        record.timestamp = now();
        record
    }

    fn pause<R: Rng + ?Sized>(&self, rng: &mut R) {
        let (min, max) = self.delay_secs;
        if let Some(delay) = pause_duration(min, max, rng) {
            info!(delay_secs = delay.as_secs_f64(), "waiting before next post");
            thread::sleep(delay);
        }
    }
}

/// Random wait in `[min, max]` seconds. `None` for a zero range or one
/// that cannot be turned into a sleep.
fn pause_duration<R: Rng + ?Sized>(min: f64, max: f64, rng: &mut R) -> Option<Duration> {
    if max <= 0.0 && min <= 0.0 {
        return None;
    }
    if !(min.is_finite() && max.is_finite()) || min < 0.0 || max < min {
        warn!(min, max, "invalid delay range, not pausing");
        return None;
    }
    let secs = if min == max {
        min
    } else {
        rng.random_range(min..=max)
    };
    Duration::try_from_secs_f64(secs).ok()
}

fn summary_stem(platform: Platform, at: NaiveDateTime) -> String {
    format!("{}_posts_{}", platform.key(), at.format("%Y%m%d_%H%M%S"))
}

/// Human-readable run summary.
pub fn format_post_summary(platform: Platform, posts: &[PostRecord], at: NaiveDateTime) -> String {
    let succeeded = posts
        .iter()
        .filter(|p| p.status == PostStatus::Success)
        .count();

    let mut out = format!(
        "{} Posting Summary - {}\n",
        platform.display_name(),
        at.format("%Y-%m-%d %H:%M:%S")
    );
    out.push_str(&"=".repeat(60));
    out.push_str("\n\n");
    out.push_str(&format!("Total Posts: {}\n", posts.len()));
    out.push_str(&format!("Successful: {succeeded}\n"));
    out.push_str(&format!("Failed: {}\n\n", posts.len() - succeeded));

    for post in posts {
        let name = Path::new(&post.image_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| post.image_path.clone());
        out.push_str(&format!("Post {}:\n", post.post_number));
        out.push_str(&format!("  Image: {name}\n"));
        out.push_str(&format!("  Size: {} bytes\n", post.file_size));
        out.push_str(&format!("  Status: {}\n", post.status.as_str()));
        if let Some(id) = &post.post_id {
            out.push_str(&format!("  Post ID: {id}\n"));
        }
        if let Some(err) = &post.error {
            out.push_str(&format!("  Error: {err}\n"));
        }
        if !post.caption.is_empty() {
            let preview: String = post.caption.chars().take(100).collect();
            out.push_str(&format!("  Caption: {preview}...\n"));
        }
        out.push_str(&format!(
            "  Time: {}\n",
            post.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f")
        ));
        out.push_str(&"-".repeat(40));
        out.push_str("\n\n");
    }
    out
}

/// Write the JSON and text summaries of a run into `posts_dir`.
pub fn write_post_summary(
    posts_dir: &Path,
    platform: Platform,
    posts: &[PostRecord],
    at: NaiveDateTime,
) -> Result<(PathBuf, PathBuf), PosterError> {
    fs::create_dir_all(posts_dir)?;
    let stem = summary_stem(platform, at);

    let json_path = posts_dir.join(format!("{stem}.json"));
    fs::write(&json_path, serde_json::to_string_pretty(posts)?)?;

    let text_path = posts_dir.join(format!("{stem}.txt"));
    fs::write(&text_path, format_post_summary(platform, posts, at))?;

    info!(json = %json_path.display(), text = %text_path.display(), "wrote post summary");
    if posts.is_empty() {
        warn!(platform = platform.key(), "post summary has no entries");
    }
    Ok((json_path, text_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::FALLBACK_CAPTION;
    use crate::publish::SimulatedPublisher;
    use crate::publish::tests::MockPublisher;
    use crate::scan::scan_todays_images;
    use crate::state::AllocationState;
    use crate::test_helpers::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        config: Config,
        store: StateStore,
        images: Vec<ImageRecord>,
    }

    /// `n` real images on disk, all queued in `platform`'s pool.
    fn fixture(platform: Platform, n: u32) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let images_dir = write_images(tmp.path(), &[("gothic", n)], fixture_day());
        write_captions(tmp.path(), "gothic", &["Pointed arches", "Flying buttresses"]);

        let mut config = Config::default();
        config.paths.images_dir = images_dir.clone();
        config.paths.captions_dir = tmp.path().join("captions");
        config.paths.posts_dir = tmp.path().join("posts");
        config.paths.state_file = tmp.path().join("state.json");
        config.posting.fast_mode = true;

        let images = scan_todays_images(&images_dir, fixture_day());
        let store = StateStore::new(&config.paths.state_file);
        let mut state = AllocationState::empty(fixture_time());
        state.pool_mut(platform).extend(images.iter().cloned());
        for img in &images {
            state.used_images.insert(img.path.clone());
        }
        store.save(&mut state);

        Fixture {
            _tmp: tmp,
            config,
            store,
            images,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(3)
    }

    // =========================================================================
    // Run
    // =========================================================================

    #[test]
    fn run_posts_front_of_pool_and_saves_rest() {
        let fx = fixture(Platform::Instagram, 5);
        let consumer = PoolConsumer::new(Platform::Instagram, &fx.config);
        let mut publisher = MockPublisher::new();

        let report = consumer.run(&fx.store, &mut publisher, &mut rng(), fixture_time());

        assert_eq!(report.posts.len(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.save, Some(SaveOutcome::Saved));

        let posted: Vec<&str> = report.posts.iter().map(|p| p.image_path.as_str()).collect();
        assert_eq!(posted, paths(&fx.images[0..3]));

        let saved = fx.store.load();
        assert_eq!(paths(&saved.instagram_pool), paths(&fx.images[3..5]));
    }

    #[test]
    fn captions_use_style_file_and_profile() {
        let fx = fixture(Platform::Instagram, 3);
        let consumer = PoolConsumer::new(Platform::Instagram, &fx.config);
        let mut publisher = MockPublisher::new();

        consumer.run(&fx.store, &mut publisher, &mut rng(), fixture_time());

        let captions: Vec<&str> = publisher.published.iter().map(|d| d.caption.as_str()).collect();
        assert!(captions[0].starts_with("Pointed arches\n\n"));
        assert!(captions[1].starts_with("Flying buttresses\n\n"));
        assert!(captions[2].starts_with(FALLBACK_CAPTION));
        assert!(captions[0].contains("#architecture"));
        assert_eq!(publisher.published[0].date, fixture_day());
    }

    #[test]
    fn run_survives_unusable_delay_range() {
        let fx = fixture(Platform::Twitter, 2);
        let mut consumer = PoolConsumer::new(Platform::Twitter, &fx.config);
        consumer.delay_secs = (0.0, f64::INFINITY);

        let report = consumer.run(&fx.store, &mut MockPublisher::new(), &mut rng(), fixture_time());

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.save, Some(SaveOutcome::Saved));
        assert!(fx.store.load().twitter_pool.is_empty());
    }

    // =========================================================================
    // Pacing
    // =========================================================================

    #[test]
    fn pause_duration_within_range() {
        let mut rng = rng();
        for _ in 0..20 {
            let d = pause_duration(1.0, 3.0, &mut rng).unwrap();
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(3));
        }
        assert_eq!(pause_duration(2.0, 2.0, &mut rng), Some(Duration::from_secs(2)));
    }

    #[test]
    fn pause_duration_skips_zero_and_unusable_ranges() {
        let mut rng = rng();
        assert_eq!(pause_duration(0.0, 0.0, &mut rng), None);
        assert_eq!(pause_duration(0.0, f64::INFINITY, &mut rng), None);
        assert_eq!(pause_duration(f64::NAN, f64::NAN, &mut rng), None);
        assert_eq!(pause_duration(5.0, 1.0, &mut rng), None);
        assert_eq!(pause_duration(1e30, 1e30, &mut rng), None);
    }

    #[test]
    fn count_override_limits_batch() {
        let fx = fixture(Platform::Linkedin, 5);
        let consumer = PoolConsumer::new(Platform::Linkedin, &fx.config).with_count(1);
        let report = consumer.run(&fx.store, &mut MockPublisher::new(), &mut rng(), fixture_time());

        assert_eq!(report.posts.len(), 1);
        assert_eq!(report.remaining, 4);
    }

    #[test]
    fn publish_failure_is_recorded_and_batch_continues() {
        let fx = fixture(Platform::Twitter, 3);
        let consumer = PoolConsumer::new(Platform::Twitter, &fx.config);
        let mut publisher = MockPublisher::failing_on(&[2]);

        let report = consumer.run(&fx.store, &mut publisher, &mut rng(), fixture_time());

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        let failed = &report.posts[1];
        assert_eq!(failed.status, PostStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("500"));
        // Failed images are not requeued.
        assert_eq!(report.remaining, 0);
        assert!(fx.store.load().twitter_pool.is_empty());
    }

    #[test]
    fn missing_image_file_is_failed_post() {
        let fx = fixture(Platform::Patreon, 2);
        fs::remove_file(&fx.images[0].path).unwrap();
        let consumer = PoolConsumer::new(Platform::Patreon, &fx.config);
        let mut publisher = MockPublisher::new();

        let report = consumer.run(&fx.store, &mut publisher, &mut rng(), fixture_time());

        assert_eq!(report.posts[0].status, PostStatus::Failed);
        assert!(report.posts[0].error.as_deref().unwrap().contains("not found"));
        assert_eq!(report.posts[1].status, PostStatus::Success);
        assert_eq!(publisher.published.len(), 1);
    }

    #[test]
    fn empty_pool_posts_nothing_and_skips_save() {
        let fx = fixture(Platform::Instagram, 2);
        let consumer = PoolConsumer::new(Platform::Linkedin, &fx.config);

        let report = consumer.run(&fx.store, &mut MockPublisher::new(), &mut rng(), fixture_time());

        assert!(report.posts.is_empty());
        assert!(report.save.is_none());
        assert!(report.summary_files.is_none());
        assert!(!fx.config.paths.posts_dir.exists());
    }

    #[test]
    fn failed_connection_leaves_pool_untouched() {
        let fx = fixture(Platform::Patreon, 2);
        let consumer = PoolConsumer::new(Platform::Patreon, &fx.config);

        let report = consumer.run(&fx.store, &mut MockPublisher::offline(), &mut rng(), fixture_time());

        assert!(report.aborted.is_some());
        assert!(report.posts.is_empty());
        assert_eq!(fx.store.load().patreon_pool.len(), 2);
    }

    #[test]
    fn simulated_publisher_runs_without_post_ids() {
        let fx = fixture(Platform::Linkedin, 2);
        let consumer = PoolConsumer::new(Platform::Linkedin, &fx.config);
        let mut publisher = SimulatedPublisher::new(Platform::Linkedin);

        let report = consumer.run(&fx.store, &mut publisher, &mut rng(), fixture_time());

        assert_eq!(report.succeeded(), 2);
        assert!(report.posts.iter().all(|p| p.post_id.is_none()));
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    #[test]
    fn run_writes_json_and_text_summaries() {
        let fx = fixture(Platform::Twitter, 2);
        let consumer = PoolConsumer::new(Platform::Twitter, &fx.config);

        let report = consumer.run(&fx.store, &mut MockPublisher::new(), &mut rng(), fixture_time());
        let (json_path, text_path) = report.summary_files.unwrap();

        assert_eq!(
            json_path.file_name().unwrap(),
            "twitter_posts_20240301_120000.json"
        );
        let posts: Vec<PostRecord> =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post_id.as_deref(), Some("mock-1"));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(raw[0]["platform"], "twitter");
        assert_eq!(raw[0]["status"], "success");
        assert!(raw[0].get("error").is_none());

        let text = fs::read_to_string(&text_path).unwrap();
        assert!(text.starts_with("Twitter Posting Summary - 2024-03-01 12:00:00\n"));
        assert!(text.contains("Total Posts: 2\nSuccessful: 2\nFailed: 0\n"));
    }

    #[test]
    fn text_summary_lists_each_post() {
        let post = PostRecord {
            platform: Platform::Patreon,
            image_path: "images/gothic/gothic_image_01_20240301_101501.jpg".into(),
            style: "gothic".into(),
            caption: "Short caption".into(),
            timestamp: fixture_time(),
            status: PostStatus::Failed,
            post_number: 1,
            file_size: 2048,
            post_id: None,
            error: Some("API error 500: boom".into()),
        };

        let text = format_post_summary(Platform::Patreon, &[post], fixture_time());

        assert!(text.contains("Post 1:\n  Image: gothic_image_01_20240301_101501.jpg\n"));
        assert!(text.contains("  Size: 2048 bytes\n  Status: failed\n"));
        assert!(text.contains("  Error: API error 500: boom\n"));
        assert!(!text.contains("Post ID"));
        assert!(text.contains("  Time: 2024-03-01T12:00:00.000000\n"));
        assert!(text.contains(&"-".repeat(40)));
    }
}
