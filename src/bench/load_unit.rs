/// Weight loader - streams weight rows into the array
use crate::builtin::{Module, Wire};

/// Controller commands seen by the loader
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadCmd {
  pub first_load: bool,
  pub w_shift: bool,
  /// Output buffer busy (filling or storing), rows are held back
  pub hold: bool,
  pub reset: bool,
}

pub struct LoadUnit {
  name: String,

  // Input: commands from the controller
  pub cmd: Wire<LoadCmd>,

  // Output: a row finished loading, value = row index within the job
  pub w_load: Wire<u32>,

  rows_per_iter: u32,
  row_interval: u32,

  budget: u32,
  started: bool,
  prev_hold: bool,
  wait: u32,
  rows_issued: u32,
}

impl LoadUnit {
  pub fn new(name: impl Into<String>, rows_per_iter: u32, row_interval: u32) -> Self {
    Self {
      name: name.into(),
      cmd: Wire::default(),
      w_load: Wire::default(),
      rows_per_iter,
      row_interval: row_interval.max(1),
      budget: 0,
      started: false,
      prev_hold: false,
      wait: 0,
      rows_issued: 0,
    }
  }

  pub fn rows_issued(&self) -> u32 {
    self.rows_issued
  }

  /// Rows still to load for the current tile
  pub fn budget(&self) -> u32 {
    self.budget
  }
}

impl Module for LoadUnit {
  fn run(&mut self) {
    let cmd = match self.cmd.get() {
      Some(cmd) => *cmd,
      None => {
        self.w_load.clear();
        return;
      },
    };

    if cmd.reset {
      self.budget = 0;
      self.started = false;
      self.prev_hold = false;
      self.wait = 0;
      self.w_load.clear();
      return;
    }

    if cmd.first_load && !self.started {
      self.started = true;
      self.budget = self.rows_per_iter;
      self.wait = 0;
    }

    // buffer handoff: one row of the next tile is already counted
    if cmd.hold && !self.prev_hold && self.started {
      self.budget = self.rows_per_iter.saturating_sub(1);
      self.wait = 0;
    }
    self.prev_hold = cmd.hold;

    let enabled = (cmd.first_load || cmd.w_shift) && !cmd.hold && self.budget > 0;
    if enabled {
      if self.wait == 0 {
        self.budget -= 1;
        self.wait = self.row_interval - 1;
        let row = self.rows_issued;
        self.rows_issued += 1;
        self.w_load.set(row);
        return;
      }
      self.wait -= 1;
    }
    self.w_load.clear();
  }

  fn reset(&mut self) {
    self.cmd = Wire::default();
    self.w_load = Wire::default();
    self.budget = 0;
    self.started = false;
    self.prev_hold = false;
    self.wait = 0;
    self.rows_issued = 0;
  }

  fn name(&self) -> &str {
    &self.name
  }
}
