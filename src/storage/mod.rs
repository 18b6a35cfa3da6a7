pub mod collection;
pub mod partitioner;
