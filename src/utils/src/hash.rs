use std::hash::Hasher;

/// hash_key computes a hash of key. Hash is always non-zero.
pub fn hash_key(key: &[u8]) -> u64 {
    let mut xx_hash = twox_hash::XxHash64::with_seed(0);
    xx_hash.write(key);
    let h = xx_hash.finish();

    if h == 0 {
        1
    } else {
        h
    }
}

/// distance returns the probe distance for a hash in a slot index.
/// The ideal slot of a hash is `hash % capacity`, capacity must be non-zero.
pub fn distance(hash: u64, i: u64, capacity: u64) -> u64 {
    let ideal = hash % capacity;
    (i % capacity + capacity - ideal) % capacity
}

#[cfg(test)]
mod tests {
    use crate::hash::{distance, hash_key};

    #[test]
    fn test_hash_key_stable() {
        let a = hash_key(b"cpu");
        let b = hash_key(b"cpu");
        assert_eq!(a, b);
        assert_ne!(a, hash_key(b"mem"));
        assert_ne!(hash_key(b""), 0);
    }

    #[test]
    fn test_distance() {
        // ideal slot 3 in a table of 8
        assert_eq!(distance(3, 3, 8), 0);
        assert_eq!(distance(3, 5, 8), 2);
        // wrap around
        assert_eq!(distance(3, 1, 8), 6);
        assert_eq!(distance(11, 3, 8), 0);

        // non power of two capacity
        assert_eq!(distance(7, 1, 5), 4);
        assert_eq!(distance(100, 0, 1), 0);
    }

    #[test]
    fn test_distance_matches_mask_for_pow2() {
        for capacity in [1_u64, 2, 4, 16, 256] {
            let mask = capacity - 1;
            for hash in [1_u64, 7, 255, 1 << 40, u64::MAX] {
                for i in 0..capacity {
                    let masked = (i + capacity - (hash & mask)) & mask;
                    assert_eq!(distance(hash, i, capacity), masked);
                }
            }
        }
    }
}
