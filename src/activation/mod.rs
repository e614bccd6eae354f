pub mod executor;
pub mod graph;
pub mod outputs;
pub mod report;

pub use executor::{Activation, Activator};
pub use graph::{topological_order, GraphError};
pub use outputs::{DuplicateOutputError, OutputRegistry};
pub use report::{ActivationReport, UnitReport, UnitState};
