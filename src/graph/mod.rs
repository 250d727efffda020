pub mod cycle_detection;
pub mod flow_graph;
pub mod netting;
pub mod scc;
