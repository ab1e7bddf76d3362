//! Active expiration sweep.
//!
//! Lazy expiration keeps reads correct; this periodic pass bounds the
//! memory held by keys nobody touches anymore. Databases are visited
//! one at a time, and within a database expired keys are deleted in
//! small batches with the write lock released between batches so
//! readers get a turn.

use tracing::debug;

use crate::store::Store;

/// Keys deleted per lock acquisition.
const SWEEP_BATCH: usize = 100;

/// Runs one sweep over every database, deleting all keys whose
/// deadline has passed. Returns the total number of keys removed.
pub fn sweep(store: &Store) -> usize {
    let mut total = 0;
    for index in 0..store.database_count() {
        loop {
            let removed = store.sweep_database(index, SWEEP_BATCH);
            total += removed;
            // a short batch means this database has no more due keys
            if removed < SWEEP_BATCH {
                break;
            }
        }
    }
    if total > 0 {
        debug!(removed = total, "expiration sweep reclaimed keys");
    }
    total
}
