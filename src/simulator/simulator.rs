use log::info;
use std::fs::File;
use std::io::{BufWriter, Result};
use std::path::Path;

use super::config::AppConfig;
use super::sim::mode::{RunMode, SimConfig, StepMode};
use super::sim::shell::{Command, Shell};
use super::sim::trace::TraceWriter;
use super::utils::report::{print_run_report, print_simulation_records};
use crate::bench::{CycleTrace, RunReport, Top};
use crate::ctrl::CtrlCore;
use crate::model::EventCtrl;

pub struct Simulator<C: CtrlCore> {
  config: SimConfig,
  top: Top<C>,
  trace: Option<TraceWriter<BufWriter<File>>>,
}

impl<C: CtrlCore> Simulator<C> {
  pub fn new(config: SimConfig, top: Top<C>) -> Result<Self> {
    let trace = match &config.trace_file {
      Some(path) => Some(TraceWriter::create(Path::new(path))?),
      None => None,
    };
    Ok(Self { config, top, trace })
  }

  pub fn top(&self) -> &Top<C> {
    &self.top
  }

  pub fn top_mut(&mut self) -> &mut Top<C> {
    &mut self.top
  }

  pub fn run(&mut self) -> Result<RunReport> {
    if !self.top.programmed() {
      self.top.program();
    }
    let report = match self.config.step_mode {
      StepMode::Continuous => self.run_continuous()?,
      StepMode::Step => self.run_step_mode()?,
    };
    if let Some(trace) = self.trace.as_mut() {
      trace.flush()?;
      info!("trace: {} cycles written to {:?}", trace.lines(), self.config.trace_file);
    }
    Ok(report)
  }

  fn run_continuous(&mut self) -> Result<RunReport> {
    let trace = &mut self.trace;
    self.top.run_with(|t| write_trace(trace, t))
  }

  fn run_step_mode(&mut self) -> Result<RunReport> {
    println!("Step mode - Enter to step, 'si N' to step N cycles, 'c' to continue, 'p' to print, 'q' to quit\n");
    let mut shell = Shell::new()?;

    while !self.top.finished() && !self.top.out_of_cycles() {
      match shell.read_command()? {
        Command::Step(n) => {
          for _ in 0..n {
            if self.top.finished() || self.top.out_of_cycles() {
              break;
            }
            let t = self.top.step()?;
            write_trace(&mut self.trace, &t)?;
            println!(
              "[{}] {} -> {}  busy={} w_shift={} z_fill={} done={}",
              t.cycle, t.state.phase, t.next.phase, t.outputs.busy, t.outputs.w_shift, t.outputs.z_fill, t.outputs.done
            );
          }
        },
        Command::Continue => return self.run_continuous(),
        Command::Print => self.print_state(),
        Command::Quit => break,
      }
    }
    Ok(self.top.report())
  }

  fn print_state(&self) {
    let s = self.top.ctrl.snapshot();
    println!(
      "cycle {}: {} rows_loaded={} computed={} computed_en={} last_row={} accumulate={} stores_done={}",
      self.top.cycle(),
      s.phase,
      s.rows_loaded,
      s.computed,
      s.computed_en,
      s.last_row,
      s.accumulate,
      s.stores_done
    );
    println!(
      "  z-buffer {}/{}  load budget {}  regs {:08x?}",
      self.top.zbuf.occupancy(),
      self.top.config().zbuf_depth,
      self.top.loader.budget(),
      self.top.regfile.words()
    );
  }
}

fn write_trace(trace: &mut Option<TraceWriter<BufWriter<File>>>, t: &CycleTrace) -> Result<()> {
  match trace {
    Some(w) => w.write(t),
    None => Ok(()),
  }
}

/// Build the bench for the configured run mode, run it and print the report
pub fn run_simulation(app: &AppConfig) -> Result<RunReport> {
  let config = SimConfig::from_app(app)?;
  let bench = app.bench_config();
  info!(
    "tilectl: {:?} mode, tile_height={} rows_per_iter={} tot_stores={}",
    config.run_mode, bench.tile_height, bench.rows_per_iter, bench.tot_stores
  );

  match config.run_mode {
    RunMode::Cycle => {
      let mut simulator = Simulator::new(config, Top::direct(bench))?;
      let report = simulator.run()?;
      print_run_report(&report);
      Ok(report)
    },
    RunMode::Event => {
      let ctrl = EventCtrl::new(bench.tile_height);
      let mut simulator = Simulator::new(config, Top::new(bench, ctrl))?;
      let report = simulator.run()?;
      print_run_report(&report);
      print_simulation_records(simulator.top_mut().ctrl.simulation());
      Ok(report)
    },
  }
}
