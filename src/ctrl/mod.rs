pub mod controller;
pub mod core;
pub mod phase;

pub use controller::{step, Controller, CtrlConfig, CtrlInputs, CtrlOutputs, CtrlState, SchedCmd};
pub use self::core::{CtrlCore, CtrlPorts};
pub use phase::Phase;
