pub mod config;
pub mod sim;
pub mod simulator;
pub mod utils;

pub use simulator::{run_simulation, Simulator};
pub use utils::log::init_log;
