//! A Robin Hood open-addressing hash map keyed by byte strings.
//!
//! The map is used transiently by on-disk index writers: it is filled in
//! memory, then its slots are enumerated in index order (`elem`) and
//! flattened into a hash index that readers probe with the same rule as
//! [`HashMap::get`].

use serde::{Deserialize, Serialize};

use crate::hash::{distance, hash_key};

/// Options represents initialization options that are passed to `HashMap::new`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Options {
    /// Expected number of elements.
    pub capacity: u64,
    /// Load factor in percent, 1..=100.
    pub load_factor: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            capacity: 256,
            load_factor: 90,
        }
    }
}

impl Options {
    pub fn new(capacity: u64, load_factor: u64) -> Self {
        Self {
            capacity,
            load_factor,
        }
    }
}

/// capacity_for returns the slot count needed to hold `n` elements at the
/// given load factor without growing. The result is always a power of 2.
pub fn capacity_for(n: u64, load_factor: u64) -> u64 {
    let load_factor = clamp_load_factor(load_factor);
    // Round up so that `capacity * load_factor / 100 >= n`.
    pow2(
        n.saturating_mul(100)
            .saturating_add(load_factor - 1)
            / load_factor,
    )
}

fn clamp_load_factor(load_factor: u64) -> u64 {
    load_factor.clamp(1, 100)
}

/// pow2 returns the next highest power of 2, or v if it already is one.
fn pow2(v: u64) -> u64 {
    v.max(1).next_power_of_two()
}

struct Elem<V> {
    key: Vec<u8>,
    value: V,
    hash: u64,
}

/// HashMap represents a hash map that implements Robin Hood Hashing.
/// https://cs.uwaterloo.ca/research/tr/1986/CS-86-14.pdf
pub struct HashMap<V> {
    elems: Vec<Option<Elem<V>>>,
    n: u64,
    capacity: u64,
    threshold: u64,
    load_factor: u64,
}

impl<V> HashMap<V> {
    pub fn new(opt: Options) -> Self {
        let load_factor = clamp_load_factor(opt.load_factor);
        let mut m = Self {
            elems: Vec::new(),
            n: 0,
            capacity: capacity_for(opt.capacity, load_factor),
            threshold: 0,
            load_factor,
        };
        m.alloc();
        m
    }

    /// len returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// cap returns the number of slots in the map.
    pub fn cap(&self) -> usize {
        self.capacity as usize
    }

    /// get returns the value for a key, if it exists.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let hash = hash_key(key);
        let mut pos = hash % self.capacity;
        let mut d = 0_u64;

        while d < self.capacity {
            let e = self.elems[pos as usize].as_ref()?;
            if e.hash == hash && e.key.as_slice() == key {
                return Some(&e.value);
            }

            // A resident closer to its ideal slot than we are to ours means
            // the key would have displaced it on insert.
            if d > distance(e.hash, pos, self.capacity) {
                return None;
            }

            pos = (pos + 1) % self.capacity;
            d += 1;
        }

        None
    }

    /// put stores value under key, replacing any previous value.
    pub fn put(&mut self, key: &[u8], value: V) {
        // Grow the map if we've run out of slots.
        self.n += 1;
        if self.n > self.threshold {
            self.grow();
        }

        // If the key was overwritten then decrement the size.
        if self.insert(hash_key(key), key.to_vec(), value) {
            self.n -= 1;
        }
    }

    /// elem returns the key and value stored at slot i, or None for an empty slot.
    pub fn elem(&self, i: usize) -> Option<(&[u8], &V)> {
        self.elems
            .get(i)
            .and_then(|e| e.as_ref())
            .map(|e| (e.key.as_slice(), &e.value))
    }

    /// insert places the element with Robin Hood displacement and reports
    /// whether an existing key was overwritten.
    fn insert(&mut self, mut hash: u64, mut key: Vec<u8>, mut value: V) -> bool {
        let capacity = self.capacity;
        let mut pos = hash % capacity;
        let mut dist = 0_u64;

        // Continue searching until we find an empty slot or lower probe distance.
        loop {
            match self.elems[pos as usize].as_mut() {
                None => {
                    self.elems[pos as usize] = Some(Elem { key, value, hash });
                    return false;
                }
                Some(e) if e.hash == hash && e.key == key => {
                    e.value = value;
                    return true;
                }
                Some(e) => {
                    // If the existing elem has probed less than us, then swap places with
                    // existing elem, and keep going to find another slot for that elem.
                    let elem_dist = distance(e.hash, pos, capacity);
                    if elem_dist < dist {
                        std::mem::swap(&mut e.hash, &mut hash);
                        std::mem::swap(&mut e.key, &mut key);
                        std::mem::swap(&mut e.value, &mut value);
                        dist = elem_dist;
                    }
                }
            }

            pos = (pos + 1) % capacity;
            dist += 1;
        }
    }

    fn alloc(&mut self) {
        self.elems = std::iter::repeat_with(|| None)
            .take(self.capacity as usize)
            .collect();
        self.threshold = self.capacity * self.load_factor / 100;
    }

    /// grow doubles the capacity and reinserts all existing elements.
    fn grow(&mut self) {
        let elems = std::mem::take(&mut self.elems);

        self.capacity *= 2;
        self.alloc();

        for e in elems.into_iter().flatten() {
            self.insert(e.hash, e.key, e.value);
        }
    }
}

impl<V> Default for HashMap<V> {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use quickcheck::quickcheck;

    use crate::hash::{distance, hash_key};
    use crate::rhh::{capacity_for, HashMap, Options};

    /// Every run of occupied slots must have probe distances that grow by at
    /// most one per slot, otherwise a lookup could stop too early.
    fn assert_robin_hood<V>(m: &HashMap<V>) {
        let cap = m.cap() as u64;
        for i in 0..cap {
            let next = (i + 1) % cap;
            if let (Some((k1, _)), Some((k2, _))) = (m.elem(i as usize), m.elem(next as usize)) {
                let d1 = distance(hash_key(k1), i, cap);
                let d2 = distance(hash_key(k2), next, cap);
                assert!(d2 <= d1 + 1, "slot {}: dist {} after {}", next, d2, d1);
            }
        }
    }

    #[test]
    fn test_capacity_for() {
        assert_eq!(capacity_for(0, 90), 1);
        assert_eq!(capacity_for(1, 90), 2);
        assert_eq!(capacity_for(1, 100), 1);
        assert_eq!(capacity_for(8, 90), 16);
        assert_eq!(capacity_for(15, 90), 32);
        assert_eq!(capacity_for(9, 90), 16);
        assert_eq!(capacity_for(256, 90), 512);
        assert_eq!(capacity_for(4, 100), 4);
        // out of range load factors are clamped
        assert_eq!(capacity_for(4, 0), capacity_for(4, 1));
        assert_eq!(capacity_for(4, 500), 4);
    }

    #[test]
    fn test_capacity_for_holds_n() {
        for load_factor in [1_u64, 50, 75, 90, 99, 100] {
            for n in 0..2000_u64 {
                let cap = capacity_for(n, load_factor);
                assert!(
                    cap * load_factor / 100 >= n,
                    "n={} lf={}: capacity {} too small",
                    n,
                    load_factor,
                    cap
                );
            }
        }
    }

    #[test]
    fn test_sized_map_does_not_grow() {
        for n in 1..2000_u64 {
            let mut m = HashMap::new(Options::new(n, 90));
            for i in 0..n {
                m.put(format!("m{}", i).as_bytes(), i);
            }

            assert_eq!(m.len() as u64, n);
            assert_eq!(m.cap() as u64, capacity_for(n, 90), "n={}", n);
        }
    }

    #[test]
    fn test_put_get() {
        let mut m = HashMap::new(Options::new(4, 90));
        m.put(b"foo", 1);
        m.put(b"bar", 2);
        m.put(b"baz", 3);

        assert_eq!(m.len(), 3);
        assert_eq!(m.get(b"foo"), Some(&1));
        assert_eq!(m.get(b"bar"), Some(&2));
        assert_eq!(m.get(b"baz"), Some(&3));
        assert_eq!(m.get(b"no_such_key"), None);
    }

    #[test]
    fn test_put_overwrite() {
        let mut m = HashMap::new(Options::new(2, 90));
        m.put(b"foo", 1);
        m.put(b"foo", 2);

        assert_eq!(m.len(), 1);
        assert_eq!(m.get(b"foo"), Some(&2));
    }

    #[test]
    fn test_grow() {
        let mut m = HashMap::new(Options::new(1, 90));
        for i in 0..1000_u32 {
            m.put(format!("key-{}", i).as_bytes(), i);
        }

        assert_eq!(m.len(), 1000);
        assert!(m.cap() >= 1000);
        assert!(m.cap().is_power_of_two());
        for i in 0..1000_u32 {
            assert_eq!(m.get(format!("key-{}", i).as_bytes()), Some(&i));
        }
        assert_robin_hood(&m);
    }

    #[test]
    fn test_full_table() {
        let mut m = HashMap::new(Options::new(8, 100));
        for i in 0..8_u32 {
            m.put(format!("m{}", i).as_bytes(), i);
        }

        assert_eq!(m.cap(), 8);
        assert_eq!(m.len(), 8);
        assert!((0..8).all(|i| m.elem(i).is_some()));
        assert_eq!(m.get(b"absent"), None);
        assert_robin_hood(&m);
    }

    #[test]
    fn test_elem_enumeration() {
        let mut m = HashMap::new(Options::new(16, 90));
        for i in 0..16_u32 {
            m.put(format!("{}", i).as_bytes(), i);
        }

        let mut seen = (0..m.cap())
            .filter_map(|i| m.elem(i))
            .map(|(_, v)| *v)
            .collect::<Vec<_>>();
        seen.sort();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
        assert!(m.elem(m.cap()).is_none());
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let opt: Options = serde_json::from_str(r#"{"load_factor": 75}"#).unwrap();
        assert_eq!(opt, Options::new(256, 75));
    }

    quickcheck! {
        fn prop_put_then_get(keys: Vec<Vec<u8>>) -> bool {
            let mut m = HashMap::new(Options::new(keys.len() as u64, 90));
            for (i, k) in keys.iter().enumerate() {
                m.put(k, i);
            }

            // last write wins for duplicate keys
            let distinct = keys.iter().collect::<HashSet<_>>();
            m.len() == distinct.len()
                && keys
                    .iter()
                    .all(|k| m.get(k) == keys.iter().rposition(|x| x == k).as_ref())
        }
    }
}
