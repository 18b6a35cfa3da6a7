use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Places documents on collection shards by hashing their key
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    num_shards: u32,
}

impl Partitioner {
    pub fn new(num_shards: u32) -> Self {
        Partitioner {
            num_shards: num_shards.max(1),
        }
    }

    pub fn num_shards(&self) -> u32 {
        self.num_shards
    }

    pub fn shard_for(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.num_shards as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_is_stable_and_in_range() {
        let partitioner = Partitioner::new(4);
        for i in 0..100 {
            let key = format!("doc-{}", i);
            let shard = partitioner.shard_for(&key);
            assert!(shard < 4);
            assert_eq!(shard, partitioner.shard_for(&key));
        }
        assert_eq!(Partitioner::new(0).shard_for("x"), 0);
    }
}
