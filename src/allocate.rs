//! Daily allocation of generated images to the four platform pools.
//!
//! The day's budget `N` (`allocation.daily_images`) is split by the
//! configured ratios into per-platform counts. Today's unused images are
//! shuffled, then handed out in contiguous slices in platform order:
//!
//! ```text
//! shuffled:  [a b c d e f g h i j]
//!             └─ig─┘└─tw─┘└li┘└pa┘     N = 10 → 3 / 3 / 2 / 2
//! ```
//!
//! When fewer than `N` images exist the slices run out early and the later
//! platforms get less, possibly nothing. Images beyond `N` are left alone
//! and stay eligible for a later run.
//!
//! Every allocated path is recorded in `used_images`, and already-used
//! paths are dropped before shuffling, so rerunning on the same day never
//! allocates an image twice.

use crate::config::{Config, RatioConfig};
use crate::scan::scan_todays_images;
use crate::state::{AllocationState, now};
use crate::store::{SaveOutcome, StateStore};
use crate::types::{ImageRecord, Platform, PlatformCounts};
use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;
use rand::seq::SliceRandom;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AllocateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not write allocation summary {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Split `budget` across platforms by `ratios`.
///
/// Each platform gets `floor(budget * ratio)`. The rounding shortfall goes
/// to the platform with the largest count, the earliest one on ties, so
/// the counts always sum to `budget`.
pub fn allocation_counts(budget: usize, ratios: &RatioConfig) -> PlatformCounts {
    let mut counts = PlatformCounts::default();
    for platform in Platform::ALL {
        // Epsilon keeps 10 * 0.3 from flooring to 2.
        let share = (budget as f64 * ratios.get(platform) + 1e-9).floor();
        *counts.get_mut(platform) = share.max(0.0) as usize;
    }

    let shortfall = budget.saturating_sub(counts.total());
    if shortfall > 0 {
        let mut largest = Platform::ALL[0];
        for platform in Platform::ALL {
            if counts.get(platform) > counts.get(largest) {
                largest = platform;
            }
        }
        *counts.get_mut(largest) += shortfall;
    }
    counts
}

/// What one call to [`allocate`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationOutcome {
    /// Images appended to each pool.
    pub allocated: PlatformCounts,
    /// Scanned images skipped because their path was already used.
    pub already_used: usize,
    /// Fresh images left unallocated because the budget was exhausted.
    pub surplus: usize,
    /// Budget slots that had no image to fill them.
    pub shortfall: usize,
}

/// Distribute `images` across the pools of `state` according to `counts`.
pub fn allocate<R: Rng + ?Sized>(
    images: Vec<ImageRecord>,
    state: &mut AllocationState,
    counts: PlatformCounts,
    rng: &mut R,
    at: NaiveDateTime,
) -> AllocationOutcome {
    let scanned = images.len();
    let mut fresh: Vec<ImageRecord> = images
        .into_iter()
        .filter(|img| !state.used_images.contains(&img.path))
        .collect();
    let already_used = scanned - fresh.len();
    if already_used > 0 {
        info!(count = already_used, "skipping images that were already allocated");
    }

    let budget = counts.total();
    if fresh.len() < budget {
        warn!(
            available = fresh.len(),
            expected = budget,
            "fewer images than the daily budget"
        );
    }

    fresh.shuffle(rng);

    let surplus = fresh.len().saturating_sub(budget);
    if surplus > 0 {
        fresh.truncate(budget);
        info!(count = surplus, "leaving surplus images unallocated");
    }
    let shortfall = budget - fresh.len();

    let mut remaining = fresh.into_iter();
    let mut allocated = PlatformCounts::default();
    for platform in Platform::ALL {
        let chunk: Vec<ImageRecord> = remaining.by_ref().take(counts.get(platform)).collect();
        for img in &chunk {
            state.used_images.insert(img.path.clone());
        }
        *allocated.get_mut(platform) = chunk.len();
        info!(
            platform = platform.key(),
            allocated = chunk.len(),
            planned = counts.get(platform),
            "allocated images"
        );
        state.pool_mut(platform).extend(chunk);
    }

    state.touch(at);
    AllocationOutcome {
        allocated,
        already_used,
        surplus,
        shortfall,
    }
}

/// Trim `used_images` to the `keep` most recent paths once it exceeds
/// `soft_cap`. Returns how many paths were removed.
pub fn cleanup_used_images(state: &mut AllocationState, soft_cap: usize, keep: usize) -> usize {
    if state.used_images.len() <= soft_cap {
        return 0;
    }
    let removed = state.used_images.retain_recent(keep);
    info!(removed, kept = state.used_images.len(), "trimmed used image registry");
    removed
}

/// Plain-text allocation report: current pool sizes and per-day plan.
pub fn format_allocation_summary(state: &AllocationState, plan: PlatformCounts) -> String {
    let mut out = String::new();
    out.push_str("Image Allocation Summary\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    out.push_str(&format!(
        "Last Updated: {}\n",
        state.last_updated.format("%Y-%m-%dT%H:%M:%S%.6f")
    ));
    out.push_str(&format!("Total Used Images: {}\n\n", state.used_images.len()));

    out.push_str("Current Pool Status:\n");
    out.push_str(&"-".repeat(30));
    out.push('\n');
    for platform in Platform::ALL {
        out.push_str(&format!(
            "{:<10}: {:>3} images\n",
            platform.display_name(),
            state.pool(platform).len()
        ));
    }

    out.push_str("\nAllocation Strategy:\n");
    out.push_str(&"-".repeat(30));
    out.push('\n');
    for platform in Platform::ALL {
        out.push_str(&format!(
            "{:<10}: {:>3} images per day\n",
            platform.display_name(),
            plan.get(platform)
        ));
    }
    out
}

pub fn write_allocation_summary(
    path: &Path,
    state: &AllocationState,
    plan: PlatformCounts,
) -> Result<(), AllocateError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format_allocation_summary(state, plan)).map_err(|source| {
        AllocateError::Summary {
            path: path.to_path_buf(),
            source,
        }
    })?;
    info!(path = %path.display(), "wrote allocation summary");
    Ok(())
}

/// Result of one allocator run.
#[derive(Debug, Clone)]
pub struct AllocationReport {
    pub date: NaiveDate,
    /// Images found for `date`.
    pub scanned: usize,
    /// Per-platform plan derived from the budget.
    pub plan: PlatformCounts,
    /// `None` when no images were found and nothing was done.
    pub outcome: Option<AllocationOutcome>,
    /// Paths dropped from `used_images` by the size cap.
    pub trimmed: usize,
    pub save: Option<SaveOutcome>,
    /// Pool sizes after the run.
    pub pools: PlatformCounts,
    pub used_images: usize,
    pub summary_file: Option<PathBuf>,
}

fn pool_sizes(state: &AllocationState) -> PlatformCounts {
    let mut sizes = PlatformCounts::default();
    for platform in Platform::ALL {
        *sizes.get_mut(platform) = state.pool(platform).len();
    }
    sizes
}

/// Full allocator run: load, scan, allocate, trim, save, write the summary.
///
/// Only a failure to write the summary is an error. A day without images
/// returns early without touching the state file.
pub fn run_allocation<R: Rng + ?Sized>(
    config: &Config,
    today: NaiveDate,
    rng: &mut R,
) -> Result<AllocationReport, AllocateError> {
    info!(date = %today, "starting image allocation");
    let store = StateStore::new(&config.paths.state_file);
    let mut state = store.load();

    let images = scan_todays_images(&config.paths.images_dir, today);
    let plan = allocation_counts(config.allocation.daily_images, &config.allocation.ratios);

    let mut report = AllocationReport {
        date: today,
        scanned: images.len(),
        plan,
        outcome: None,
        trimmed: 0,
        save: None,
        pools: pool_sizes(&state),
        used_images: state.used_images.len(),
        summary_file: None,
    };

    if images.is_empty() {
        warn!(date = %today, "no images found for today");
        return Ok(report);
    }

    let outcome = allocate(images, &mut state, plan, rng, now());
    report.trimmed = cleanup_used_images(
        &mut state,
        config.allocation.used_images_soft_cap,
        config.allocation.used_images_keep,
    );
    report.save = Some(store.save(&mut state));

    write_allocation_summary(&config.paths.summary_file, &state, plan)?;
    report.summary_file = Some(config.paths.summary_file.clone());

    report.pools = pool_sizes(&state);
    report.used_images = state.used_images.len();
    report.outcome = Some(outcome);
    info!(
        allocated = report.outcome.as_ref().map_or(0, |o| o.allocated.total()),
        used = report.used_images,
        "image allocation complete"
    );
    Ok(report)
}
