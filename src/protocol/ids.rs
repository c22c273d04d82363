//! Process-wide unique-id generator.
//!
//! One monotonic u32 counter feeds both request ids and watch-token tags.
//! Ids wrap modulo 2^32; wrap-around over a long-lived process is
//! expected and not an error.

use std::sync::atomic::{AtomicU32, Ordering};

static NEXT: AtomicU32 = AtomicU32::new(0);

/// Return a fresh id (the pre-increment counter value).
pub fn fresh_id() -> u32 {
    NEXT.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_and_increasing() {
        let a = fresh_id();
        let b = fresh_id();
        let c = fresh_id();
        // other tests draw ids concurrently, so only relative order holds
        assert!(a < b);
        assert!(b < c);
    }
}
