//! Origin/destination selection and its resolution into query constraints.

pub mod resolver;
pub mod side;

pub use resolver::resolve_selection;
pub use side::{CorridorSelection, SelectionRejected, Side, SideSelection};
