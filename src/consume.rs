//! FIFO consumption of a platform pool.

use crate::state::AllocationState;
use crate::types::{ImageRecord, Platform};
use tracing::{info, warn};

/// Pop up to `count` records from the front of `platform`'s pool.
///
/// Takes everything that is left when the pool is shorter than `count`.
/// An empty pool yields an empty batch.
pub fn consume(state: &mut AllocationState, platform: Platform, count: usize) -> Vec<ImageRecord> {
    let pool = state.pool_mut(platform);
    if pool.is_empty() {
        warn!(platform = platform.key(), "pool is empty, nothing to post");
        return Vec::new();
    }
    if pool.len() < count {
        warn!(
            platform = platform.key(),
            available = pool.len(),
            requested = count,
            "pool has fewer images than requested"
        );
    }
    let take = count.min(pool.len());
    let batch: Vec<ImageRecord> = pool.drain(..take).collect();
    info!(
        platform = platform.key(),
        taken = batch.len(),
        remaining = pool.len(),
        "took images from pool"
    );
    batch
}
