/// Systolic engine stand-in: only the pipeline cadence is modelled
use crate::builtin::{Module, Wire};

#[derive(Clone, Copy, Debug, Default)]
pub struct EngineCmd {
  pub shift: bool,
  pub accumulate: bool,
  pub flush: bool,
}

pub struct Engine {
  name: String,

  // Input: controller commands
  pub cmd: Wire<EngineCmd>,

  // Output: pipeline registers advanced, value = beat number
  pub pipe_en: Wire<u64>,

  pipe_interval: u32,
  wait: u32,

  beats: u64,
  acc_beats: u64,
  flushes: u64,
}

impl Engine {
  pub fn new(name: impl Into<String>, pipe_interval: u32) -> Self {
    Self {
      name: name.into(),
      cmd: Wire::default(),
      pipe_en: Wire::default(),
      pipe_interval: pipe_interval.max(1),
      wait: 0,
      beats: 0,
      acc_beats: 0,
      flushes: 0,
    }
  }

  pub fn beats(&self) -> u64 {
    self.beats
  }

  /// Beats issued while the controller asked for accumulation
  pub fn acc_beats(&self) -> u64 {
    self.acc_beats
  }

  pub fn flushes(&self) -> u64 {
    self.flushes
  }
}

impl Module for Engine {
  fn run(&mut self) {
    let cmd = match self.cmd.get() {
      Some(cmd) => *cmd,
      None => {
        self.pipe_en.clear();
        return;
      },
    };

    if cmd.flush {
      self.flushes += 1;
      self.wait = 0;
    }

    if cmd.shift {
      if self.wait == 0 {
        self.beats += 1;
        if cmd.accumulate {
          self.acc_beats += 1;
        }
        self.wait = self.pipe_interval - 1;
        self.pipe_en.set(self.beats);
        return;
      }
      self.wait -= 1;
    }
    self.pipe_en.clear();
  }

  fn reset(&mut self) {
    self.cmd = Wire::default();
    self.pipe_en = Wire::default();
    self.wait = 0;
    self.beats = 0;
    self.acc_beats = 0;
    self.flushes = 0;
  }

  fn name(&self) -> &str {
    &self.name
  }
}
