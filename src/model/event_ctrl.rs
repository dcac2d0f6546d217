use log::trace;
use sim::models::{Model, Reportable};
use sim::simulator::{Connector, Message, Simulation};
use std::io;

use super::ctrl_model::{CtrlModel, CtrlReport, CtrlTick};
use super::probe::OutputProbe;
use crate::ctrl::{CtrlConfig, CtrlCore, CtrlInputs, CtrlOutputs, CtrlState};

pub const CTRL_ID: &str = "ctrl";
pub const PROBE_ID: &str = "probe";
pub const TICK_PORT: &str = "tick";
pub const REPORT_PORT: &str = "report";

// Steps allowed for a tick to come back as a report
const MAX_STEPS_PER_TICK: usize = 4;

pub fn create_simulation() -> Simulation {
  let models = vec![
    Model::new(
      String::from(CTRL_ID),
      Box::new(CtrlModel::new(String::from(TICK_PORT), String::from(REPORT_PORT))),
    ),
    Model::new(String::from(PROBE_ID), Box::new(OutputProbe::new(String::from(REPORT_PORT)))),
  ];

  let connectors = vec![Connector::new(
    String::from("ctrl_probe"),
    String::from(CTRL_ID),
    String::from(PROBE_ID),
    String::from(REPORT_PORT),
    String::from(REPORT_PORT),
  )];

  Simulation::post(models, connectors)
}

fn sim_err(e: impl std::fmt::Debug) -> io::Error {
  io::Error::new(io::ErrorKind::Other, format!("Simulation error: {:?}", e))
}

/// Controller clocked through the discrete-event engine
pub struct EventCtrl {
  simulation: Simulation,
  tile_height: u32,
  state: CtrlState,
  cycle: u64,
}

impl EventCtrl {
  pub fn new(tile_height: u32) -> Self {
    Self {
      simulation: create_simulation(),
      tile_height,
      state: CtrlState::default(),
      cycle: 0,
    }
  }

  pub fn simulation(&mut self) -> &mut Simulation {
    &mut self.simulation
  }

  /// Number of model records collected so far
  pub fn record_count(&mut self) -> usize {
    self.simulation.models().iter().map(|m| m.records().len()).sum()
  }
}

impl CtrlCore for EventCtrl {
  fn tile_height(&self) -> u32 {
    self.tile_height
  }

  fn clock(&mut self, inputs: &CtrlInputs, cfg: &CtrlConfig) -> io::Result<CtrlOutputs> {
    let tick = CtrlTick {
      inputs: *inputs,
      config: *cfg,
    };
    let content = serde_json::to_string(&tick).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let msg = Message::new(
      String::from("bench"),
      String::from(TICK_PORT),
      String::from(CTRL_ID),
      String::from(TICK_PORT),
      self.simulation.get_global_time(),
      content,
    );
    self.simulation.inject_input(msg);

    let mut report = None;
    for _ in 0..MAX_STEPS_PER_TICK {
      let messages = self.simulation.step().map_err(sim_err)?;
      report = messages
        .iter()
        .find(|msg| msg.source_id() == CTRL_ID && msg.source_port() == REPORT_PORT)
        .map(|msg| msg.content().to_string());
      if report.is_some() {
        break;
      }
    }
    let content = report.ok_or_else(|| {
      io::Error::new(
        io::ErrorKind::Other,
        format!("controller model did not report for cycle {}", self.cycle),
      )
    })?;
    let report: CtrlReport =
      serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // hand the report to the probe
    self.simulation.step().map_err(sim_err)?;

    trace!(
      "event ctrl t={:.1}: {} (cycle {})",
      self.simulation.get_global_time(),
      report.state.phase,
      self.cycle
    );
    self.state = report.state;
    self.cycle += 1;
    Ok(report.outputs)
  }

  fn snapshot(&self) -> CtrlState {
    self.state
  }

  fn reset(&mut self) {
    self.simulation = create_simulation();
    self.state = CtrlState::default();
    self.cycle = 0;
  }
}
