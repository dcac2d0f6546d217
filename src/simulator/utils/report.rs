use sim::models::{Model, Reportable};
use sim::simulator::Simulation;
use std::fmt::Write;

use crate::bench::RunReport;
use crate::ctrl::Phase;

pub fn format_run_report(report: &RunReport) -> String {
  let mut out = String::new();
  let outcome = if report.done {
    "done"
  } else if report.cancelled {
    "cancelled"
  } else if report.stalled {
    "stalled"
  } else {
    "running"
  };

  let _ = writeln!(out, "--- Run Report ---");
  let _ = writeln!(out, "  outcome     : {}", outcome);
  let _ = writeln!(out, "  cycles      : {}", report.cycles);
  let _ = writeln!(out, "  stores      : {}", report.stores);
  let _ = writeln!(out, "  flushes     : {}", report.flushes);
  let _ = writeln!(out, "  rows loaded : {}", report.rows_loaded);
  let _ = writeln!(out, "  pipe beats  : {} ({} accumulating)", report.pipe_beats, report.acc_beats);
  let _ = writeln!(out, "  z fills     : {}", report.z_fills);
  let _ = writeln!(out, "  events      : {:#010b}", report.events);
  for phase in Phase::ALL {
    let _ = writeln!(out, "  {:<12}: {}", phase.to_string(), report.phase_cycles[phase.index()]);
  }
  let _ = writeln!(out, "--- End Report ---");
  out
}

pub fn print_run_report(report: &RunReport) {
  println!("\n{}", format_run_report(report));
}

pub fn print_simulation_records(simulation: &mut Simulation) {
  println!("\n--- Simulation Records ---");

  for model in simulation.models().iter() {
    print_model_records(model);
  }

  println!("--- End Records ---\n");
}

fn print_model_records(model: &Model) {
  let records = model.records();

  if !records.is_empty() {
    println!("\n[{}]", model.id());
    for record in records {
      println!("  Time {:.1}: {} {}", record.time, record.action, record.subject);
    }
  }
}
