use std::io;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
  /// Controller stepped in-process
  Cycle,
  /// Controller clocked through the DEVS model
  Event,
}

impl FromStr for RunMode {
  type Err = io::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "cycle" => Ok(RunMode::Cycle),
      "event" => Ok(RunMode::Event),
      other => Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unsupported run mode: {}", other),
      )),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
  pub run_mode: RunMode,
  pub quiet: bool,
  pub step_mode: StepMode,
  pub trace_file: Option<String>,
}

impl SimConfig {
  pub fn from_app(config: &crate::simulator::config::AppConfig) -> io::Result<Self> {
    let sim = &config.simulation;
    Ok(Self {
      run_mode: sim.run_mode.parse()?,
      quiet: sim.quiet,
      step_mode: if sim.step_mode {
        StepMode::Step
      } else {
        StepMode::Continuous
      },
      trace_file: if sim.trace_file.is_empty() {
        None
      } else {
        Some(sim.trace_file.clone())
      },
    })
  }
}
