use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::Neighbor;

/// Heap entry ordered so that the *worst* candidate is the greatest: lower
/// score first, then the lexicographically larger user id. Keeping a max-heap
/// of these bounded to k leaves the best k on the heap.
struct Ranked(Neighbor);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .score
            .total_cmp(&self.0.score)
            .then_with(|| self.0.user_id.cmp(&other.0.user_id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Select the `k` best candidates, ordered by descending score with ties
/// broken by ascending user id. Returns fewer than `k` when fewer candidates
/// exist.
pub fn top_k(candidates: impl IntoIterator<Item = Neighbor>, k: usize) -> Vec<Neighbor> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for candidate in candidates {
        heap.push(Ranked(candidate));
        if heap.len() > k {
            heap.pop();
        }
    }
    heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
}
