use serde::{Deserialize, Serialize};
use sim::models::model_trait::{DevsModel, Reportable, ReportableModel, SerializableModel};
use sim::models::{ModelMessage, ModelRecord};
use sim::simulator::Services;
use sim::utils::errors::SimulationError;
use std::f64::INFINITY;

use crate::ctrl::{step, CtrlConfig, CtrlInputs, CtrlOutputs, CtrlState};
use crate::model_record;

/// Clock period of the controller model, in simulation time units
pub const CLOCK_PERIOD: f64 = 1.0;

/// One clock worth of inputs, sent to the `tick` port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtrlTick {
  pub inputs: CtrlInputs,
  pub config: CtrlConfig,
}

/// Emitted on the `report` port after every clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtrlReport {
  pub outputs: CtrlOutputs,
  pub state: CtrlState,
}

/// The phase controller as a DEVS atomic model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtrlModel {
  tick_port: String,
  report_port: String,
  state: CtrlState,
  pending: Option<CtrlTick>,
  until_next_event: f64,
  records: Vec<ModelRecord>,
}

impl CtrlModel {
  pub fn new(tick_port: String, report_port: String) -> Self {
    Self {
      tick_port,
      report_port,
      state: CtrlState::default(),
      pending: None,
      until_next_event: INFINITY,
      records: Vec::new(),
    }
  }

  pub fn state(&self) -> &CtrlState {
    &self.state
  }
}

impl DevsModel for CtrlModel {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    if incoming_message.port_name != self.tick_port {
      return Err(SimulationError::InvalidModelState);
    }
    let tick: CtrlTick =
      serde_json::from_str(&incoming_message.content).map_err(|_| SimulationError::InvalidModelState)?;

    if tick.inputs.clear_requested() {
      model_record!(self, services, "clear_requested", format!("phase={}", self.state.phase));
    }
    self.pending = Some(tick);
    self.until_next_event = CLOCK_PERIOD;
    Ok(())
  }

  fn events_int(&mut self, services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    let mut messages = Vec::new();

    if let Some(tick) = self.pending.take() {
      let (next, outputs) = step(&self.state, &tick.inputs, &tick.config);

      if next.phase != self.state.phase {
        model_record!(
          self,
          services,
          "phase",
          format!("{} -> {} rows={} stores={}", self.state.phase, next.phase, next.rows_loaded, next.stores_done)
        );
      }
      if outputs.done {
        model_record!(self, services, "done", format!("tot_stores={}", tick.config.tot_stores));
      }
      self.state = next;

      let report = CtrlReport {
        outputs,
        state: self.state,
      };
      messages.push(ModelMessage {
        content: serde_json::to_string(&report).map_err(|_| SimulationError::InvalidModelState)?,
        port_name: self.report_port.clone(),
      });
    }

    self.until_next_event = INFINITY;
    Ok(messages)
  }

  fn time_advance(&mut self, time_delta: f64) {
    self.until_next_event -= time_delta;
  }

  fn until_next_event(&self) -> f64 {
    self.until_next_event
  }
}

impl Reportable for CtrlModel {
  fn status(&self) -> String {
    format!("{}", self.state.phase)
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for CtrlModel {}

impl SerializableModel for CtrlModel {
  fn get_type(&self) -> &'static str {
    "CtrlModel"
  }
}
