use serde::{Deserialize, Serialize};
use sim::models::model_trait::{DevsModel, Reportable, ReportableModel, SerializableModel};
use sim::models::{ModelMessage, ModelRecord};
use sim::simulator::Services;
use sim::utils::errors::SimulationError;
use std::f64::INFINITY;

use super::ctrl_model::CtrlReport;
use crate::model_record;

/// Sink for controller reports; keeps the latest one and a record per change
/// of phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputProbe {
  report_port: String,
  last: Option<CtrlReport>,
  received: u64,
  records: Vec<ModelRecord>,
}

impl OutputProbe {
  pub fn new(report_port: String) -> Self {
    Self {
      report_port,
      last: None,
      received: 0,
      records: Vec::new(),
    }
  }

  pub fn last(&self) -> Option<&CtrlReport> {
    self.last.as_ref()
  }

  pub fn received(&self) -> u64 {
    self.received
  }
}

impl DevsModel for OutputProbe {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    if incoming_message.port_name != self.report_port {
      return Err(SimulationError::InvalidModelState);
    }
    let report: CtrlReport =
      serde_json::from_str(&incoming_message.content).map_err(|_| SimulationError::InvalidModelState)?;

    let prev = self.last.map(|r| r.state.phase);
    if prev != Some(report.state.phase) {
      model_record!(self, services, "observe", format!("phase={}", report.state.phase));
    }
    self.last = Some(report);
    self.received += 1;
    Ok(())
  }

  fn events_int(&mut self, _services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    Ok(Vec::new())
  }

  fn time_advance(&mut self, _time_delta: f64) {}

  fn until_next_event(&self) -> f64 {
    INFINITY
  }
}

impl Reportable for OutputProbe {
  fn status(&self) -> String {
    format!("{} reports", self.received)
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for OutputProbe {}

impl SerializableModel for OutputProbe {
  fn get_type(&self) -> &'static str {
    "OutputProbe"
  }
}
