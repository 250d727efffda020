pub mod catalog;
pub mod entity;
pub mod filter;
pub mod flow;
pub mod period;
