//! Sharded Bloom + exact-set deduplication for canonical cycle ids
//!
//! Sharded by the first byte of the canonical id so concurrent community
//! jobs touch independent locks; collisions only serialize within a shard.

use bloomfilter::Bloom;
use parking_lot::Mutex;
use tl_common::CanonicalId;

const SHARD_COUNT: usize = 256;

struct Shard {
    bloom: Mutex<Bloom<CanonicalId>>,
    exact: Mutex<std::collections::HashSet<CanonicalId>>,
}

/// Global dedup gate, shared across every community job in a discovery run
/// (and, when cross-community bridging is enabled, across communities) so
/// duplicate cycles found via different start vertices are only emitted
/// once.
pub struct DedupGate {
    shards: Vec<Shard>,
}

impl DedupGate {
    /// Build a gate sized for roughly `capacity` total distinct ids at the
    /// given false-positive rate, divided evenly across shards
    pub fn new(capacity: usize, fpr: f64) -> Self {
        let per_shard = (capacity / SHARD_COUNT).max(16);
        let shards = (0..SHARD_COUNT)
            .map(|_| Shard {
                bloom: Mutex::new(Bloom::new_for_fp_rate(per_shard, fpr)),
                exact: Mutex::new(std::collections::HashSet::new()),
            })
            .collect();
        Self { shards }
    }

    fn shard_for(&self, id: &CanonicalId) -> &Shard {
        let byte = id.0.as_bytes().first().copied().unwrap_or(0) as usize;
        &self.shards[byte % SHARD_COUNT]
    }

    /// Probe and admit `id`. Returns `true` if this is the first time this
    /// id has been seen by this gate (admit), `false` if it is an exact
    /// duplicate (suppress).
    pub fn probe_and_insert(&self, id: &CanonicalId) -> bool {
        let shard = self.shard_for(id);
        let mut bloom = shard.bloom.lock();
        if bloom.check(id) {
            let exact = shard.exact.lock();
            if exact.contains(id) {
                return false;
            }
        }
        bloom.set(id);
        drop(bloom);
        shard.exact.lock().insert(id.clone());
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_probe_admits_second_suppresses() {
        let gate = DedupGate::new(1000, 0.001);
        let id = CanonicalId("A>B:item1".to_string());

        assert!(gate.probe_and_insert(&id));
        assert!(!gate.probe_and_insert(&id));
    }

    #[test]
    fn distinct_ids_do_not_collide() {
        let gate = DedupGate::new(1000, 0.001);
        let a = CanonicalId("A>B:item1".to_string());
        let b = CanonicalId("B>C:item2".to_string());

        assert!(gate.probe_and_insert(&a));
        assert!(gate.probe_and_insert(&b));
    }
}
