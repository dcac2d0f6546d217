pub mod ctrl_model;
pub mod event_ctrl;
pub mod probe;

pub use ctrl_model::{CtrlModel, CtrlReport, CtrlTick, CLOCK_PERIOD};
pub use event_ctrl::{create_simulation, EventCtrl, CTRL_ID, PROBE_ID, REPORT_PORT, TICK_PORT};
pub use probe::OutputProbe;
