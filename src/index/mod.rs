pub mod bounds;
pub mod inverted;
pub mod posting;
pub mod shard_index;
pub mod snapshot;
pub mod typed;
