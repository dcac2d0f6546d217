/// Output staging buffer; the controller only sees full/empty
use crate::builtin::{Module, Wire};

#[derive(Clone, Copy, Debug, Default)]
pub struct ZBufCmd {
  pub fill: bool,
  pub clk_en: bool,
  /// Store unit is draining the buffer
  pub drain: bool,
  pub clear: bool,
}

pub struct ZBuffer {
  name: String,

  // Input: controller commands
  pub cmd: Wire<ZBufCmd>,

  depth: u32,
  store_interval: u32,

  occupancy: u32,
  wait: u32,
  fills: u64,
  drains: u64,
}

impl ZBuffer {
  pub fn new(name: impl Into<String>, depth: u32, store_interval: u32) -> Self {
    Self {
      name: name.into(),
      cmd: Wire::default(),
      depth: depth.max(1),
      store_interval: store_interval.max(1),
      occupancy: 0,
      wait: 0,
      fills: 0,
      drains: 0,
    }
  }

  pub fn full(&self) -> bool {
    self.occupancy >= self.depth
  }

  pub fn empty(&self) -> bool {
    self.occupancy == 0
  }

  pub fn occupancy(&self) -> u32 {
    self.occupancy
  }

  pub fn fills(&self) -> u64 {
    self.fills
  }

  pub fn drains(&self) -> u64 {
    self.drains
  }
}

impl Module for ZBuffer {
  fn run(&mut self) {
    let cmd = match self.cmd.get() {
      Some(cmd) => *cmd,
      None => return,
    };

    if cmd.clear {
      self.occupancy = 0;
      self.wait = 0;
      return;
    }

    // fills only land while the buffer is clocked
    if cmd.clk_en && cmd.fill && !self.full() {
      self.occupancy += 1;
      self.fills += 1;
    }

    if cmd.drain && !self.empty() {
      if self.wait == 0 {
        self.occupancy -= 1;
        self.drains += 1;
        self.wait = self.store_interval - 1;
      } else {
        self.wait -= 1;
      }
    } else if !cmd.drain {
      self.wait = 0;
    }
  }

  fn reset(&mut self) {
    self.cmd = Wire::default();
    self.occupancy = 0;
    self.wait = 0;
    self.fills = 0;
    self.drains = 0;
  }

  fn name(&self) -> &str {
    &self.name
  }
}
