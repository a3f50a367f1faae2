//! # Zine Pools
//!
//! Daily image allocation and posting queues for the architectural research
//! zine. The image generator drops a batch of images every day; this crate
//! decides which platform each image goes to and drains those queues one
//! post run at a time.
//!
//! # Architecture: Allocate Once, Consume Independently
//!
//! ```text
//! images/<style>/*.jpg ──scan──▶ allocate ──▶ image_allocation_state.json
//!                                                │
//!                    ┌──────────────┬────────────┼──────────────┐
//!                    ▼              ▼            ▼              ▼
//!               post instagram  post twitter  post linkedin  post patreon
//!                    │              │            │              │
//!                    └──────────────┴─────┬──────┴──────────────┘
//!                                         ▼
//!                        posts/<platform>_posts_<stamp>.{json,txt}
//! ```
//!
//! The allocator and each poster are separate short-lived processes that
//! meet only in the state file. The allocator appends to the four pools;
//! each poster pops from the front of its own pool. Because every pool is
//! FIFO and every allocated path is remembered in `used_images`, an image
//! is posted at most once, on exactly one platform.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Finds today's images under `images/<style>/` |
//! | [`naming`] | Parses the generator's `<style>_image_NN_YYYYMMDD_HHMMSS` filenames |
//! | [`state`] | The persisted pools plus the used-image registry |
//! | [`store`] | Loads and saves the state with backup, atomic replace and restore |
//! | [`allocate`] | Splits the daily budget by platform ratio and fills the pools |
//! | [`consume`] | FIFO pop from one pool |
//! | [`caption`] | Base caption lookup and per-platform caption profiles |
//! | [`publish`] | `Publisher` trait, simulated publisher, Patreon API client |
//! | [`poster`] | One posting run: consume, caption, publish, summarize, save |
//! | [`config`] | `zine.toml` loading, merging, validation and env overrides |
//! | [`logging`] | Stderr plus per-run log file subscriber |
//! | [`output`] | CLI output formatting for each command |
//! | [`types`] | `Platform`, `ImageRecord`, per-platform counts |
//!
//! # Design Decisions
//!
//! ## Ratios Apply to the Budget, Not to What Was Found
//!
//! The split is computed from `allocation.daily_images`, so a normal day of
//! 10 images always goes 3 / 3 / 2 / 2. On a short day the shuffled images
//! are sliced in platform order and run out early: Instagram and Twitter
//! fill first and Patreon may get nothing. Images beyond the budget stay
//! unallocated and are picked up by a later run.
//!
//! ## Loading Never Fails
//!
//! A missing or corrupt state file means "start over with empty pools",
//! logged at error level. Posting jobs run unattended on a schedule, and a
//! broken state file must not stop them. The `.backup` sibling written
//! before every save is there for manual recovery.
//!
//! ## No Locking
//!
//! Runs are scheduled at different times of day. If two runs do overlap,
//! the last writer wins and the other run's pool changes are lost. Writes
//! go through a temp file and rename, so a reader never sees a half
//! written document.
//!
//! ## Injected Dates and Randomness
//!
//! Scanning and allocation take `today` as an argument, and every shuffle,
//! hashtag sample and posting delay draws from a caller-supplied `Rng`.
//! Tests drive whole runs with a fixed day and a seeded `StdRng`. Only
//! save stamps and post timestamps read the wall clock.

pub mod allocate;
pub mod caption;
pub mod config;
pub mod consume;
pub mod logging;
pub mod naming;
pub mod output;
pub mod poster;
pub mod publish;
pub mod scan;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
