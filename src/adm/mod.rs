pub mod result;
pub mod stats;
pub mod tags;
