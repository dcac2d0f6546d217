pub mod bench;
pub mod builtin;
pub mod bus;
pub mod ctrl;
pub mod model;
pub mod regfile;
pub mod simulator;

pub use simulator::sim::mode::{RunMode, SimConfig, StepMode};
