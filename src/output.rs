//! CLI output formatting for the allocator, posters and status view.
//!
//! Output is what a person running a command wants to know first: counts
//! per platform, then what happened to each image, then where the files
//! went. Details sit on indented lines below their header.
//!
//! # Output Format
//!
//! ## Allocate
//!
//! ```text
//! Allocated 10 of 10 images for 2024-03-01
//!     Instagram    3  (pool 5)
//!     Twitter      3  (pool 3)
//!     LinkedIn     2  (pool 2)
//!     Patreon      2  (pool 4)
//! Used images: 10
//! Summary: allocation_summary.txt
//! ```
//!
//! ## Post
//!
//! ```text
//! Twitter: 2 posted, 1 failed
//!     001 gothic_image_01_20240301_101501.jpg  success
//!     002 gothic_image_02_20240301_101502.jpg  failed: API error 500: boom
//!     003 gothic_image_03_20240301_101503.jpg  success  (id 98765)
//! Remaining in pool: 4
//! Summary: posts/twitter_posts_20240301_120000.json
//! ```
//!
//! ## Status
//!
//! ```text
//! Pools
//!     Instagram    3
//!     Twitter      3
//!     LinkedIn     2
//!     Patreon      2
//!     Total       10
//! Used images: 10
//! Last updated: 2024-03-01 12:00:00
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::allocate::AllocationReport;
use crate::poster::{ConsumptionReport, PostStatus};
use crate::state::AllocationState;
use crate::store::SaveOutcome;
use crate::types::{Platform, PlatformCounts};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn platform_row(platform: Platform, count: usize) -> String {
    format!("{}{:<10} {:>3}", indent(1), platform.display_name(), count)
}

fn save_line(outcome: SaveOutcome) -> Option<String> {
    match outcome {
        SaveOutcome::Saved => None,
        SaveOutcome::RestoredBackup => {
            Some("State: save failed, previous state restored from backup".to_string())
        }
        SaveOutcome::Failed => Some("State: save failed".to_string()),
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

// ============================================================================
// Allocate
// ============================================================================

pub fn format_allocation_report(report: &AllocationReport) -> Vec<String> {
    let Some(outcome) = &report.outcome else {
        return vec![format!("No images found for {}", report.date)];
    };

    let mut lines = vec![format!(
        "Allocated {} of {} images for {}",
        outcome.allocated.total(),
        report.plan.total(),
        report.date
    )];
    for platform in Platform::ALL {
        lines.push(format!(
            "{}  (pool {})",
            platform_row(platform, outcome.allocated.get(platform)),
            report.pools.get(platform)
        ));
    }
    if outcome.already_used > 0 {
        lines.push(format!("{}Skipped: {} already allocated", indent(1), outcome.already_used));
    }
    if outcome.surplus > 0 {
        lines.push(format!("{}Surplus: {} left unallocated", indent(1), outcome.surplus));
    }
    if outcome.shortfall > 0 {
        lines.push(format!("{}Shortfall: {} slots unfilled", indent(1), outcome.shortfall));
    }

    if report.trimmed > 0 {
        lines.push(format!(
            "Used images: {} (trimmed {})",
            report.used_images, report.trimmed
        ));
    } else {
        lines.push(format!("Used images: {}", report.used_images));
    }
    if let Some(line) = report.save.and_then(save_line) {
        lines.push(line);
    }
    if let Some(path) = &report.summary_file {
        lines.push(format!("Summary: {}", path.display()));
    }
    lines
}

pub fn print_allocation_report(report: &AllocationReport) {
    for line in format_allocation_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Post
// ============================================================================

pub fn format_consumption_report(report: &ConsumptionReport) -> Vec<String> {
    let name = report.platform.display_name();
    if let Some(reason) = &report.aborted {
        return vec![format!("{name}: aborted before posting: {reason}")];
    }
    if report.posts.is_empty() {
        return vec![
            format!("{name}: pool empty, nothing posted"),
            format!("Remaining in pool: {}", report.remaining),
        ];
    }

    let mut lines = vec![format!(
        "{name}: {} posted, {} failed",
        report.succeeded(),
        report.failed()
    )];
    for post in &report.posts {
        let mut line = format!(
            "{}{} {}  ",
            indent(1),
            format_index(post.post_number),
            file_name(&post.image_path)
        );
        match post.status {
            PostStatus::Success => line.push_str("success"),
            PostStatus::Failed => {
                line.push_str("failed");
                if let Some(err) = &post.error {
                    line.push_str(&format!(": {err}"));
                }
            }
        }
        if let Some(id) = &post.post_id {
            line.push_str(&format!("  (id {id})"));
        }
        lines.push(line);
    }
    lines.push(format!("Remaining in pool: {}", report.remaining));
    if let Some((json, _)) = &report.summary_files {
        lines.push(format!("Summary: {}", json.display()));
    }
    if let Some(line) = report.save.and_then(save_line) {
        lines.push(line);
    }
    lines
}

pub fn print_consumption_report(report: &ConsumptionReport) {
    for line in format_consumption_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Status
// ============================================================================

pub fn format_status(state: &AllocationState, plan: PlatformCounts) -> Vec<String> {
    let mut lines = vec!["Pools".to_string()];
    for platform in Platform::ALL {
        lines.push(platform_row(platform, state.pool(platform).len()));
    }
    lines.push(format!("{}{:<10} {:>3}", indent(1), "Total", state.pending()));
    lines.push(format!("Used images: {}", state.used_images.len()));
    lines.push(format!(
        "Last updated: {}",
        state.last_updated.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(String::new());
    lines.push(format!("Daily plan ({} images)", plan.total()));
    for platform in Platform::ALL {
        lines.push(platform_row(platform, plan.get(platform)));
    }
    lines
}

pub fn print_status(state: &AllocationState, plan: PlatformCounts) {
    for line in format_status(state, plan) {
        println!("{}", line);
    }
}
