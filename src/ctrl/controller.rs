// Tile sequencer for the weight-stationary matmul engine
//
// One call to `step` is one clock edge: every next-state value is computed
// from the incoming snapshot, so no counter can advance twice in a cycle.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io;

use super::core::{CtrlCore, CtrlPorts};
use super::phase::Phase;
use crate::builtin::{Module, Wire};
use crate::regfile::RegSnapshot;

/// Job parameters. `tile_height` is fixed by the array, the other two come
/// from the register file and are re-read every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CtrlConfig {
  pub tile_height: u32,
  pub rows_per_iter: u32,
  pub tot_stores: u32,
}

/// Flags sampled once per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CtrlInputs {
  pub start: bool,
  pub test_mode: bool,
  pub soft_clear: bool,
  pub global_clear: bool,
  /// A weight row finished loading
  pub w_load: bool,
  /// Engine pipeline registers advanced
  pub pipe_en: bool,
  pub z_full: bool,
  pub z_empty: bool,
}

impl CtrlInputs {
  pub fn clear_requested(&self) -> bool {
    self.soft_clear || self.global_clear
  }

  pub fn trigger(&self) -> bool {
    self.start || self.test_mode
  }
}

/// Command bundle for the load/store scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedCmd {
  pub first_load: bool,
  pub storing: bool,
  pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CtrlOutputs {
  pub busy: bool,
  pub clear: bool,
  pub done: bool,
  pub w_shift: bool,
  pub z_fill: bool,
  pub z_clk_en: bool,
  pub flush: bool,
  pub accumulate: bool,
  pub sched: SchedCmd,
  pub sched_reset: bool,
}

/// Registered state. `Default` is the post-reset value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CtrlState {
  pub phase: Phase,
  pub rows_loaded: u32,
  /// Pipeline beats since the current row boundary
  pub computed: u32,
  /// `computed` only counts while this is set
  pub computed_en: bool,
  pub last_row: bool,
  pub accumulate: bool,
  pub stores_done: u32,
}

/// Next state and this cycle's outputs from the current state and flags
pub fn step(cur: &CtrlState, inp: &CtrlInputs, cfg: &CtrlConfig) -> (CtrlState, CtrlOutputs) {
  let mut out = CtrlOutputs {
    busy: cur.phase.is_busy(),
    w_shift: cur.phase.shifts_weights(),
    accumulate: cur.accumulate,
    clear: inp.clear_requested(),
    ..CtrlOutputs::default()
  };

  // Clear beats every same-cycle increment
  if inp.clear_requested() {
    out.z_clk_en = true;
    return (CtrlState::default(), out);
  }

  let mut next = *cur;
  let rows = if inp.w_load {
    cur.rows_loaded.saturating_add(1)
  } else {
    cur.rows_loaded
  };

  match cur.phase {
    Phase::Idle => {
      next = CtrlState::default();
      if inp.trigger() {
        next.phase = Phase::Starting;
      }
    },
    Phase::Starting => {
      out.sched.first_load = true;
      if inp.w_load {
        next.rows_loaded = rows;
        next.phase = Phase::Computing;
      }
    },
    Phase::Computing => {
      next.rows_loaded = rows;
      compute(cur, inp, cfg, &mut next);
    },
    Phase::Buffering => {
      out.z_clk_en = true;
      out.z_fill = inp.pipe_en;
      next.rows_loaded = rows;
      next.last_row = false;
      if inp.z_full {
        next.phase = Phase::Storing;
        next.accumulate = true;
      }
    },
    Phase::Storing => {
      out.sched.storing = true;
      next.rows_loaded = rows;
      if inp.z_empty {
        // tot_stores of 0 finishes after the first store
        if cur.stores_done.saturating_add(1) >= cfg.tot_stores {
          next.phase = Phase::Finished;
          next.stores_done = 0;
        } else {
          next.stores_done = cur.stores_done + 1;
          next.phase = Phase::Computing;
          // one row is already latched from the handoff
          next.rows_loaded = 1;
          next.last_row = false;
        }
      }
    },
    Phase::Finished => {
      out.done = true;
      out.flush = true;
      out.sched.finished = true;
      out.sched_reset = true;
      next = CtrlState::default();
    },
  }

  (next, out)
}

/// Computing phase: row boundaries arm the beat counter, a wrap on an inner
/// pass switches the engine to accumulate, the drain of the last pass hands
/// over to buffering.
fn compute(cur: &CtrlState, inp: &CtrlInputs, cfg: &CtrlConfig, next: &mut CtrlState) {
  let at_tile = cur.rows_loaded == cfg.tile_height;
  let at_iter = cur.rows_loaded == cfg.rows_per_iter;
  let beat = cur.computed_en && inp.pipe_en;

  if cur.last_row {
    if cur.computed >= cfg.tile_height.saturating_sub(2) && inp.pipe_en {
      next.phase = Phase::Buffering;
      // the row latched during the handoff belongs to the next tile
      next.rows_loaded = 1;
      next.accumulate = false;
      next.computed_en = false;
      next.computed = 0;
      return;
    }
    if beat {
      next.computed = (cur.computed + 1).min(cfg.tile_height);
    }
  } else if cur.computed_en && cur.computed >= cfg.tile_height.saturating_sub(1) {
    next.accumulate = true;
    next.computed_en = false;
    next.computed = 0;
  } else if beat {
    next.computed = (cur.computed + 1).min(cfg.tile_height);
  }

  // a boundary seen on the wrap cycle re-arms the counter
  if at_tile || at_iter {
    next.computed_en = true;
  }
  if at_iter {
    next.last_row = true;
  }
}

/// Controller - owns the registered state and clocks it through `step`
#[derive(Debug, Clone)]
pub struct Controller {
  name: String,
  tile_height: u32,
  state: CtrlState,
  cycle: u64,

  // Input: sampled flags and the register file as seen this cycle
  pub inputs: Wire<CtrlInputs>,
  pub regs: Wire<RegSnapshot>,

  // Output: control signals plus the forwarded register view
  pub ports: Wire<CtrlPorts>,
}

impl Controller {
  pub fn new(name: impl Into<String>, tile_height: u32) -> Self {
    Self {
      name: name.into(),
      tile_height,
      state: CtrlState::default(),
      cycle: 0,
      inputs: Wire::default(),
      regs: Wire::default(),
      ports: Wire::default(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn state(&self) -> &CtrlState {
    &self.state
  }

  pub fn phase(&self) -> Phase {
    self.state.phase
  }

  fn advance(&mut self, inputs: &CtrlInputs, cfg: &CtrlConfig) -> CtrlOutputs {
    let (next, out) = step(&self.state, inputs, cfg);

    if next.phase != self.state.phase {
      debug!(
        "{} @{}: {} -> {} (rows={}, stores={})",
        self.name, self.cycle, self.state.phase, next.phase, next.rows_loaded, next.stores_done
      );
    }
    if out.clear && self.state.phase != Phase::Idle {
      info!("{} @{}: cleared while {}", self.name, self.cycle, self.state.phase);
    }
    if out.done {
      info!("{} @{}: job finished", self.name, self.cycle);
    }

    self.state = next;
    self.cycle += 1;
    out
  }
}

impl CtrlCore for Controller {
  fn tile_height(&self) -> u32 {
    self.tile_height
  }

  fn clock(&mut self, inputs: &CtrlInputs, cfg: &CtrlConfig) -> io::Result<CtrlOutputs> {
    Ok(self.advance(inputs, cfg))
  }

  fn snapshot(&self) -> CtrlState {
    self.state
  }

  fn reset(&mut self) {
    self.state = CtrlState::default();
    self.cycle = 0;
  }
}

impl Module for Controller {
  /// Clocks only while the input wire is driven; the register view is read
  /// as it stands, valid or not.
  fn run(&mut self) {
    let inputs = match self.inputs.get() {
      Some(inputs) => *inputs,
      None => {
        self.ports.clear();
        return;
      },
    };
    let regs = self.regs.value;
    let cfg = regs.config(self.tile_height);
    let outputs = self.advance(&inputs, &cfg);
    self.ports.set(CtrlPorts {
      outputs,
      events: regs.events,
      regs,
    });
  }

  fn reset(&mut self) {
    CtrlCore::reset(self);
    self.inputs = Wire::default();
    self.regs = Wire::default();
    self.ports = Wire::default();
  }

  fn name(&self) -> &str {
    &self.name
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cfg(tile_height: u32, rows_per_iter: u32, tot_stores: u32) -> CtrlConfig {
    CtrlConfig {
      tile_height,
      rows_per_iter,
      tot_stores,
    }
  }

  fn tick(s: &mut CtrlState, inp: CtrlInputs, c: &CtrlConfig) -> CtrlOutputs {
    let (next, out) = step(s, &inp, c);
    *s = next;
    out
  }

  fn sig(f: impl FnOnce(&mut CtrlInputs)) -> CtrlInputs {
    let mut i = CtrlInputs::default();
    f(&mut i);
    i
  }

  /// Reactive stand-in for the load/engine/buffer side: rows while computing,
  /// a pipeline beat every cycle, buffer full as soon as buffering starts.
  fn run_until(s: &mut CtrlState, c: &CtrlConfig, budget: &mut u32, target: Phase) -> usize {
    for n in 0..500 {
      if s.phase == target {
        return n;
      }
      let w_load = matches!(s.phase, Phase::Starting | Phase::Computing) && *budget > 0;
      if w_load {
        *budget -= 1;
      }
      let inp = CtrlInputs {
        start: s.phase == Phase::Idle,
        w_load,
        pipe_en: true,
        z_full: s.phase == Phase::Buffering,
        ..CtrlInputs::default()
      };
      let (next, _) = step(s, &inp, c);
      if s.phase == Phase::Computing && next.phase == Phase::Buffering {
        *budget = c.rows_per_iter - 1;
      }
      *s = next;
    }
    panic!("never reached {}", target);
  }

  #[test]
  fn test_idle_without_trigger() {
    let c = cfg(4, 4, 1);
    let mut s = CtrlState::default();
    for _ in 0..10 {
      let out = tick(&mut s, sig(|i| i.w_load = true), &c);
      assert_eq!(s, CtrlState::default());
      assert!(!out.busy);
      assert!(!out.w_shift);
    }
  }

  #[test]
  fn test_trigger_and_first_load() {
    let c = cfg(4, 4, 1);
    let mut s = CtrlState::default();

    tick(&mut s, sig(|i| i.start = true), &c);
    assert_eq!(s.phase, Phase::Starting);

    // keeps asking for the first load until a row lands
    for _ in 0..3 {
      let out = tick(&mut s, CtrlInputs::default(), &c);
      assert!(out.sched.first_load);
      assert!(out.busy);
      assert!(!out.w_shift);
      assert_eq!(s.phase, Phase::Starting);
    }

    tick(&mut s, sig(|i| i.w_load = true), &c);
    assert_eq!(s.phase, Phase::Computing);
    assert_eq!(s.rows_loaded, 1);
  }

  #[test]
  fn test_test_mode_forces_start() {
    let c = cfg(4, 4, 1);
    let mut s = CtrlState::default();
    tick(&mut s, sig(|i| i.test_mode = true), &c);
    assert_eq!(s.phase, Phase::Starting);
  }

  #[test]
  fn test_full_run_single_store() {
    let c = cfg(4, 4, 1);
    let mut s = CtrlState::default();

    tick(&mut s, sig(|i| i.start = true), &c);
    tick(&mut s, sig(|i| i.w_load = true), &c);
    for _ in 0..3 {
      tick(
        &mut s,
        sig(|i| {
          i.w_load = true;
          i.pipe_en = true;
        }),
        &c,
      );
    }
    assert_eq!(s.phase, Phase::Computing);
    assert_eq!(s.rows_loaded, 4);
    assert!(!s.last_row);

    // boundary: both the tile and the iteration row count are reached
    tick(&mut s, sig(|i| i.pipe_en = true), &c);
    assert!(s.last_row);
    assert!(s.computed_en);
    assert_eq!(s.computed, 0);

    tick(&mut s, sig(|i| i.pipe_en = true), &c);
    assert_eq!(s.computed, 1);
    tick(&mut s, sig(|i| i.pipe_en = true), &c);
    assert_eq!(s.computed, 2);

    // drain point without a beat holds
    tick(&mut s, CtrlInputs::default(), &c);
    assert_eq!(s.phase, Phase::Computing);
    assert_eq!(s.computed, 2);

    tick(&mut s, sig(|i| i.pipe_en = true), &c);
    assert_eq!(s.phase, Phase::Buffering);
    assert_eq!(s.rows_loaded, 1);
    assert!(!s.accumulate);
    assert!(!s.computed_en);
    assert!(s.last_row);

    let out = tick(&mut s, sig(|i| i.pipe_en = true), &c);
    assert!(out.z_clk_en);
    assert!(out.z_fill);
    assert!(out.w_shift);
    assert!(!s.last_row);
    assert_eq!(s.phase, Phase::Buffering);

    tick(&mut s, sig(|i| i.z_full = true), &c);
    assert_eq!(s.phase, Phase::Storing);
    assert!(s.accumulate);

    let out = tick(&mut s, CtrlInputs::default(), &c);
    assert!(out.sched.storing);
    assert_eq!(s.phase, Phase::Storing);

    tick(&mut s, sig(|i| i.z_empty = true), &c);
    assert_eq!(s.phase, Phase::Finished);
    assert_eq!(s.stores_done, 0);

    let out = tick(&mut s, CtrlInputs::default(), &c);
    assert!(out.done);
    assert!(!out.busy);
    assert!(out.flush);
    assert!(out.sched_reset);
    assert!(out.sched.finished);
    assert_eq!(s, CtrlState::default());
  }

  #[test]
  fn test_accumulate_set_once_before_first_wrap() {
    let c = cfg(4, 8, 1);
    let mut s = CtrlState::default();
    tick(&mut s, sig(|i| i.start = true), &c);

    let mut rows_fed = 0;
    let mut rises = 0;
    let mut wrapped = false;
    for _ in 0..20 {
      let w_load = s.phase == Phase::Starting || (s.phase == Phase::Computing && rows_fed < 8);
      if w_load {
        rows_fed += 1;
      }
      let before = s;
      tick(
        &mut s,
        sig(|i| {
          i.w_load = w_load;
          i.pipe_en = before.phase == Phase::Computing;
        }),
        &c,
      );
      if !before.accumulate && s.accumulate {
        rises += 1;
      }
      if before.computed == c.tile_height - 1 && s.computed == 0 {
        wrapped = true;
        break;
      }
    }
    assert!(wrapped);
    assert_eq!(rises, 1);
    assert!(s.accumulate);
    assert_eq!(s.phase, Phase::Computing);
  }

  #[test]
  fn test_inner_pass_then_last_pass() {
    let c = cfg(4, 8, 1);
    let mut s = CtrlState::default();
    let mut budget = 8;
    run_until(&mut s, &c, &mut budget, Phase::Buffering);
    assert_eq!(budget, 7);
    run_until(&mut s, &c, &mut budget, Phase::Storing);
    assert!(s.accumulate);
  }

  #[test]
  fn test_three_stores() {
    let c = cfg(4, 4, 3);
    let mut s = CtrlState::default();
    let mut budget = 4;

    for expected in 0..3 {
      run_until(&mut s, &c, &mut budget, Phase::Storing);
      assert_eq!(s.stores_done, expected);
      tick(&mut s, sig(|i| i.z_empty = true), &c);
      if expected < 2 {
        assert_eq!(s.phase, Phase::Computing);
        assert_eq!(s.stores_done, expected + 1);
        assert_eq!(s.rows_loaded, 1);
        assert!(!s.last_row);
      } else {
        assert_eq!(s.phase, Phase::Finished);
        assert_eq!(s.stores_done, 0);
      }
    }
  }

  #[test]
  fn test_reentry_drops_rows_loaded_while_draining() {
    let c = cfg(4, 4, 2);
    let mut s = CtrlState::default();
    let mut budget = 4;
    run_until(&mut s, &c, &mut budget, Phase::Buffering);
    assert_eq!(s.rows_loaded, 1);

    // rows keep arriving while the buffer fills and drains
    tick(&mut s, sig(|i| i.w_load = true), &c);
    assert_eq!(s.phase, Phase::Buffering);
    tick(
      &mut s,
      sig(|i| {
        i.w_load = true;
        i.z_full = true;
      }),
      &c,
    );
    assert_eq!(s.phase, Phase::Storing);
    assert_eq!(s.rows_loaded, 3);

    tick(
      &mut s,
      sig(|i| {
        i.w_load = true;
        i.z_empty = true;
      }),
      &c,
    );
    assert_eq!(s.phase, Phase::Computing);
    assert_eq!(s.rows_loaded, 1);
    assert!(!s.last_row);
    assert_eq!(s.stores_done, 1);
  }

  #[test]
  fn test_zero_total_stores_finishes() {
    let c = cfg(4, 4, 0);
    let mut s = CtrlState::default();
    let mut budget = 4;
    run_until(&mut s, &c, &mut budget, Phase::Storing);
    tick(&mut s, sig(|i| i.z_empty = true), &c);
    assert_eq!(s.phase, Phase::Finished);
    assert_eq!(s.stores_done, 0);
  }

  #[test]
  fn test_clear_wins_over_increment() {
    let c = cfg(4, 4, 1);
    let mut s = CtrlState {
      phase: Phase::Computing,
      rows_loaded: 2,
      computed: 1,
      computed_en: true,
      last_row: true,
      accumulate: true,
      stores_done: 0,
    };
    let out = tick(
      &mut s,
      sig(|i| {
        i.w_load = true;
        i.pipe_en = true;
        i.soft_clear = true;
      }),
      &c,
    );
    assert_eq!(s, CtrlState::default());
    assert!(out.clear);
    assert!(out.z_clk_en);
  }

  #[test]
  fn test_global_clear_from_every_phase() {
    let c = cfg(4, 4, 2);
    let mut seen = [false; 6];
    // replay the same run, clearing at cycle k
    for k in 0..60 {
      let mut s = CtrlState::default();
      let mut budget = 4;
      for n in 0..k {
        if s.phase == Phase::Finished {
          break;
        }
        let w_load = matches!(s.phase, Phase::Starting | Phase::Computing) && budget > 0;
        if w_load {
          budget -= 1;
        }
        let inp = CtrlInputs {
          start: n == 0,
          w_load,
          pipe_en: true,
          z_full: s.phase == Phase::Buffering,
          z_empty: s.phase == Phase::Storing,
          ..CtrlInputs::default()
        };
        let (next, _) = step(&s, &inp, &c);
        if s.phase == Phase::Computing && next.phase == Phase::Buffering {
          budget = 3;
        }
        s = next;
      }
      seen[s.phase.index()] = true;
      let out = tick(
        &mut s,
        sig(|i| {
          i.global_clear = true;
          i.start = true;
          i.w_load = true;
          i.pipe_en = true;
          i.z_empty = true;
        }),
        &c,
      );
      assert_eq!(s, CtrlState::default(), "clear at cycle {}", k);
      assert!(out.clear);
    }
    assert!(seen.iter().all(|&p| p), "phases reached: {:?}", seen);
  }

  #[test]
  fn test_trigger_ignored_while_busy() {
    let c = cfg(4, 4, 2);
    let mut s = CtrlState::default();
    let mut budget = 4;
    for target in [Phase::Starting, Phase::Computing, Phase::Buffering, Phase::Storing] {
      run_until(&mut s, &c, &mut budget, target);
      for extra in [
        CtrlInputs::default(),
        sig(|i| i.pipe_en = true),
        sig(|i| i.w_load = true),
      ] {
        let with_start = CtrlInputs { start: true, ..extra };
        let with_test = CtrlInputs { test_mode: true, ..extra };
        let (a, oa) = step(&s, &extra, &c);
        let (b, ob) = step(&s, &with_start, &c);
        let (t, ot) = step(&s, &with_test, &c);
        assert_eq!(a, b, "{}", target);
        assert_eq!(a, t, "{}", target);
        assert_eq!(oa, ob);
        assert_eq!(oa, ot);
      }
    }
  }

  #[test]
  fn test_z_fill_only_while_buffering() {
    let c = cfg(4, 4, 1);
    for phase in Phase::ALL {
      let s = CtrlState {
        phase,
        ..CtrlState::default()
      };
      let (_, out) = step(&s, &sig(|i| i.pipe_en = true), &c);
      assert_eq!(out.z_fill, phase == Phase::Buffering, "{}", phase);
      assert_eq!(out.z_clk_en, phase == Phase::Buffering, "{}", phase);
      assert_eq!(out.busy, phase.is_busy());
      assert_eq!(out.w_shift, phase.shifts_weights());

      let (_, out) = step(&s, &CtrlInputs::default(), &c);
      assert!(!out.z_fill);
    }
  }

  #[test]
  fn test_counters_stay_in_range() {
    let c = cfg(4, 6, 3);
    let mut s = CtrlState::default();
    let mut x: u32 = 0x1234_5678;
    for _ in 0..20_000 {
      // xorshift
      x ^= x << 13;
      x ^= x >> 17;
      x ^= x << 5;
      let inp = CtrlInputs {
        start: x & 1 != 0,
        test_mode: false,
        soft_clear: x & 0xFFF == 0,
        global_clear: false,
        w_load: x & 2 != 0,
        pipe_en: x & 4 != 0,
        z_full: x & 8 != 0,
        z_empty: x & 16 != 0,
      };
      let prev = s;
      tick(&mut s, inp, &c);
      assert!(s.computed <= c.tile_height, "{:?}", s);
      assert!(s.stores_done <= c.tot_stores, "{:?}", s);
      if prev.phase == Phase::Finished || inp.clear_requested() {
        assert_eq!(s, CtrlState::default());
      }
    }
  }

  #[test]
  fn test_controller_core_clock() {
    let c = cfg(4, 4, 1);
    let mut ctrl = Controller::new("ctrl", 4);
    assert_eq!(ctrl.tile_height(), 4);
    let out = ctrl.clock(&sig(|i| i.start = true), &c).unwrap();
    assert!(!out.busy);
    assert_eq!(ctrl.phase(), Phase::Starting);
    assert_eq!(ctrl.snapshot().phase, Phase::Starting);

    CtrlCore::reset(&mut ctrl);
    assert_eq!(*ctrl.state(), CtrlState::default());
  }

  #[test]
  fn test_controller_module_forwards_registers() {
    let mut ctrl = Controller::new("ctrl", 4);
    ctrl.run();
    assert!(ctrl.ports.get().is_none());

    let mut regs = RegSnapshot::default();
    regs.words[2] = 4 << 16;
    regs.words[3] = 1 << 16;
    regs.events = 0b100;
    ctrl.regs.set(regs);
    ctrl.inputs.set(sig(|i| i.start = true));
    ctrl.run();

    let ports = ctrl.ports.get().copied().unwrap();
    assert_eq!(ports.events, 0b100);
    assert_eq!(ports.regs, regs);
    assert!(!ports.outputs.busy);
    assert_eq!(ctrl.phase(), Phase::Starting);

    ctrl.inputs.set(CtrlInputs::default());
    ctrl.run();
    assert!(ctrl.ports.get().unwrap().outputs.sched.first_load);

    Module::reset(&mut ctrl);
    assert_eq!(ctrl.phase(), Phase::Idle);
    assert!(ctrl.ports.get().is_none());
  }
}
