pub mod engine;
pub mod latest;
pub mod source;
pub mod stats;
