pub mod scorer;
pub mod stats;
