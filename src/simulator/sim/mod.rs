pub mod mode;
pub mod records;
pub mod shell;
pub mod trace;

pub use mode::{RunMode, SimConfig, StepMode};
pub use shell::{Command, Shell};
pub use trace::TraceWriter;
