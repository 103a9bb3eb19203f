// src/services/ordering.rs

//! Newest-first ordering check over a collected sequence.

use crate::models::{Item, SortingViolation};

/// Find every adjacent pair where the later item is more recent.
///
/// Pairs with an unknown timestamp on either side are skipped; equal
/// timestamps are in order.
pub fn validate(items: &[Item]) -> Vec<SortingViolation> {
    items
        .windows(2)
        .filter_map(|pair| {
            let (current, next) = (&pair[0], &pair[1]);
            let (current_time, next_time) = (current.normalized_time?, next.normalized_time?);
            (current_time < next_time).then(|| SortingViolation {
                position: current.position,
                current: current.clone(),
                next: next.clone(),
            })
        })
        .collect()
}
