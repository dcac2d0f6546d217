use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::io;

use super::engine::{Engine, EngineCmd};
use super::load_unit::{LoadCmd, LoadUnit};
use super::zbuffer::{ZBufCmd, ZBuffer};
use super::BenchConfig;
use crate::builtin::Module;
use crate::bus::{WideReq, WidthAdapter};
use crate::ctrl::{Controller, CtrlCore, CtrlInputs, CtrlOutputs, CtrlState, Phase};
use crate::regfile::{reg_addr, RegFile, CTRL_START, REG_CTRL, REG_STATUS, REG_TOT_STORES, REG_W_ROWS_ITER, STATUS_DONE};

/// Requester id used by the host model on the register port
pub const HOST_ID: u8 = 1;

/// One clock of the bench, as written to the trace file
#[derive(Debug, Clone, Serialize)]
pub struct CycleTrace {
  pub cycle: u64,
  /// State the clock edge started from
  pub state: CtrlState,
  pub next: CtrlState,
  pub inputs: CtrlInputs,
  pub outputs: CtrlOutputs,
  pub events: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
  pub cycles: u64,
  /// Host saw the done bit in STATUS
  pub done: bool,
  pub cancelled: bool,
  pub stalled: bool,
  pub stores: u64,
  pub flushes: u64,
  /// Cycles spent per phase, indexed by `Phase::index`
  pub phase_cycles: [u64; 6],
  pub rows_loaded: u32,
  pub pipe_beats: u64,
  pub acc_beats: u64,
  pub z_fills: u64,
  pub events: u8,
}

/// Bench top: controller, register port and the behavioral collaborators
pub struct Top<C: CtrlCore> {
  name: String,
  cfg: BenchConfig,

  pub ctrl: C,
  pub regfile: RegFile,
  pub adapter: WidthAdapter,
  pub loader: LoadUnit,
  pub engine: Engine,
  pub zbuf: ZBuffer,

  host_queue: VecDeque<WideReq>,
  programmed: bool,
  read_pending: bool,
  host_done: bool,

  cycle: u64,
  report: RunReport,
}

impl Top<Controller> {
  /// Bench around the in-process controller
  pub fn direct(cfg: BenchConfig) -> Self {
    let ctrl = Controller::new("ctrl", cfg.tile_height);
    Self::new(cfg, ctrl)
  }
}

impl<C: CtrlCore> Top<C> {
  pub fn new(cfg: BenchConfig, ctrl: C) -> Self {
    Self {
      name: "top".to_string(),
      ctrl,
      regfile: RegFile::new("regfile"),
      adapter: WidthAdapter::new("width_adapter"),
      loader: LoadUnit::new("load_unit", cfg.rows_per_iter, cfg.row_interval),
      engine: Engine::new("engine", cfg.pipe_interval),
      zbuf: ZBuffer::new("zbuffer", cfg.zbuf_depth, cfg.store_interval),
      host_queue: VecDeque::new(),
      programmed: false,
      read_pending: false,
      host_done: false,
      cycle: 0,
      report: RunReport::default(),
      cfg,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn cycle(&self) -> u64 {
    self.cycle
  }

  pub fn config(&self) -> &BenchConfig {
    &self.cfg
  }

  /// Queue the host writes that configure and start a job
  pub fn program(&mut self) {
    let cfg = &self.cfg;
    self
      .host_queue
      .push_back(WideReq::write32(reg_addr(REG_W_ROWS_ITER), cfg.rows_per_iter << 16, HOST_ID));
    self
      .host_queue
      .push_back(WideReq::write32(reg_addr(REG_TOT_STORES), cfg.tot_stores << 16, HOST_ID));
    self
      .host_queue
      .push_back(WideReq::write32(reg_addr(REG_CTRL), CTRL_START, HOST_ID));
    self.programmed = true;
    debug!(
      "{}: job queued (rows_per_iter={}, tot_stores={})",
      self.name, cfg.rows_per_iter, cfg.tot_stores
    );
  }

  /// Push an extra host access onto the register port
  pub fn host_access(&mut self, req: WideReq) {
    self.host_queue.push_back(req);
  }

  /// Job over from the bench's point of view
  pub fn finished(&self) -> bool {
    self.host_done || self.report.cancelled
  }

  /// Clock every block once, controller first
  pub fn step(&mut self) -> io::Result<CycleTrace> {
    let regs = self.regfile.snapshot();
    let inputs = CtrlInputs {
      start: self.regfile.start_pulse(),
      test_mode: self.cfg.test_mode,
      soft_clear: self.regfile.clear_pulse(),
      global_clear: self.cfg.clear_at == Some(self.cycle),
      w_load: self.loader.w_load.valid,
      pipe_en: self.engine.pipe_en.valid,
      z_full: self.zbuf.full(),
      z_empty: self.zbuf.empty(),
    };

    let before = self.ctrl.snapshot();
    let ports = self.ctrl.clock_regs(&inputs, &regs)?;
    let out = ports.outputs;

    self.regfile.tick();
    self.regfile.set_status(out.busy, out.done);

    self.loader.cmd.set(LoadCmd {
      first_load: out.sched.first_load,
      w_shift: out.w_shift,
      hold: out.z_clk_en || out.sched.storing,
      reset: out.sched_reset || out.clear,
    });
    self.loader.run();

    self.engine.cmd.set(EngineCmd {
      shift: out.w_shift,
      accumulate: out.accumulate,
      flush: out.flush,
    });
    self.engine.run();

    self.zbuf.cmd.set(ZBufCmd {
      fill: out.z_fill,
      clk_en: out.z_clk_en,
      drain: out.sched.storing,
      clear: out.clear,
    });
    self.zbuf.run();

    self.host_port();

    self.account(&before, &inputs, &out, ports.events);
    let trace = CycleTrace {
      cycle: self.cycle,
      state: before,
      next: self.ctrl.snapshot(),
      inputs,
      outputs: out,
      events: ports.events,
    };
    self.cycle += 1;
    Ok(trace)
  }

  /// True once the cycle budget is spent without the job ending
  pub fn out_of_cycles(&mut self) -> bool {
    if self.finished() || self.cycle < self.cfg.max_cycles {
      return false;
    }
    if !self.report.stalled {
      self.report.stalled = true;
      warn!(
        "{}: no completion after {} cycles, controller in {}",
        self.name,
        self.cycle,
        self.ctrl.snapshot().phase
      );
    }
    true
  }

  /// Run the job to completion, cancellation or `max_cycles`, handing every
  /// cycle to `on_cycle`
  pub fn run_with(&mut self, mut on_cycle: impl FnMut(&CycleTrace) -> io::Result<()>) -> io::Result<RunReport> {
    if !self.programmed {
      self.program();
    }
    while !self.finished() && !self.out_of_cycles() {
      let trace = self.step()?;
      on_cycle(&trace)?;
    }
    Ok(self.report())
  }

  pub fn run(&mut self) -> io::Result<RunReport> {
    self.run_with(|_| Ok(()))
  }

  pub fn programmed(&self) -> bool {
    self.programmed
  }

  pub fn report(&self) -> RunReport {
    let mut report = self.report.clone();
    report.cycles = self.cycle;
    report.done = self.host_done;
    report.rows_loaded = self.loader.rows_issued();
    report.pipe_beats = self.engine.beats();
    report.acc_beats = self.engine.acc_beats();
    report.z_fills = self.zbuf.fills();
    report.events = self.regfile.events();
    report
  }

  pub fn reset(&mut self) {
    self.ctrl.reset();
    self.regfile.reset();
    self.adapter.reset();
    self.loader.reset();
    self.engine.reset();
    self.zbuf.reset();
    self.host_queue.clear();
    self.programmed = false;
    self.read_pending = false;
    self.host_done = false;
    self.cycle = 0;
    self.report = RunReport::default();
  }

  // Host model on the wide side of the adapter: queued writes first, then a
  // STATUS poll with at most one read in flight.
  fn host_port(&mut self) {
    match self.host_queue.pop_front() {
      Some(req) => {
        if !req.we {
          self.read_pending = true;
        }
        self.adapter.req_in.set(req);
      },
      None if self.programmed && !self.read_pending && !self.host_done => {
        self.adapter.req_in.set(WideReq::read32(reg_addr(REG_STATUS), HOST_ID));
        self.read_pending = true;
      },
      None => self.adapter.req_in.clear(),
    }

    self.adapter.run();
    if let Some(resp) = self.adapter.resp_out.get().copied() {
      self.read_pending = false;
      if resp.id == HOST_ID && (resp.data as u32) & STATUS_DONE != 0 && !self.host_done {
        self.host_done = true;
        info!("{} @{}: host saw done", self.name, self.cycle);
      }
    }

    // narrow side, response comes back next cycle
    self.regfile.req = self.adapter.narrow_req_out.clone();
    self.regfile.run();
    self.adapter.narrow_resp_in = self.regfile.resp.clone();
  }

  fn account(&mut self, before: &CtrlState, inputs: &CtrlInputs, out: &CtrlOutputs, events: u8) {
    self.report.phase_cycles[before.phase.index()] += 1;
    if before.phase == Phase::Storing && inputs.z_empty && !out.clear {
      self.report.stores += 1;
    }
    if out.flush {
      self.report.flushes += 1;
    }
    if out.clear && before.phase != Phase::Idle {
      self.report.cancelled = true;
    }
    self.report.events = events;
  }
}
