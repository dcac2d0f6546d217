/// Register-mapped configuration and status block
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::builtin::{Module, Wire};
use crate::bus::{NarrowReq, NarrowResp};
use crate::ctrl::CtrlConfig;

pub const NUM_REGS: usize = 8;
pub const MAX_REQUESTERS: usize = 8;

// Register map (word index)
pub const REG_CTRL: usize = 0;
pub const REG_STATUS: usize = 1;
pub const REG_W_ROWS_ITER: usize = 2;
pub const REG_TOT_STORES: usize = 3;

// REG_CTRL bits, self-clearing
pub const CTRL_START: u32 = 1 << 0;
pub const CTRL_CLEAR: u32 = 1 << 1;

// REG_STATUS bits, read-only
pub const STATUS_DONE: u32 = 1 << 0;
pub const STATUS_BUSY: u32 = 1 << 1;

/// Byte address of a register word
pub const fn reg_addr(idx: usize) -> u32 {
  (idx as u32) << 2
}

/// Upper half of a configuration word; the lower half is reserved
fn upper_half(word: u32) -> u32 {
  word >> 16
}

fn byte_mask(be: u8) -> u32 {
  (0..4u32)
    .filter(|b| be & (1u8 << *b) != 0)
    .fold(0u32, |m, b| m | (0xFFu32 << (b * 8)))
}

/// Register words and event flags as seen in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegSnapshot {
  pub words: [u32; NUM_REGS],
  pub events: u8,
}

impl RegSnapshot {
  pub fn config(&self, tile_height: u32) -> CtrlConfig {
    CtrlConfig {
      tile_height,
      rows_per_iter: upper_half(self.words[REG_W_ROWS_ITER]),
      tot_stores: upper_half(self.words[REG_TOT_STORES]),
    }
  }
}

/// Register File - narrow-port register block feeding the controller
pub struct RegFile {
  name: String,

  // Input: register port request
  pub req: Wire<NarrowReq>,

  // Output: read response, one cycle after the request
  pub resp: Wire<NarrowResp>,

  words: [u32; NUM_REGS],

  start_pulse: bool,
  clear_pulse: bool,
  starter: u8,

  done: bool,
  busy: bool,
  events: u8,
}

impl RegFile {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      req: Wire::default(),
      resp: Wire::default(),
      words: [0; NUM_REGS],
      start_pulse: false,
      clear_pulse: false,
      starter: 0,
      done: false,
      busy: false,
      events: 0,
    }
  }

  /// Field view handed to the controller, re-read on every call
  pub fn config(&self, tile_height: u32) -> CtrlConfig {
    self.snapshot().config(tile_height)
  }

  pub fn snapshot(&self) -> RegSnapshot {
    RegSnapshot {
      words: self.words,
      events: self.events,
    }
  }

  pub fn rows_per_iter(&self) -> u32 {
    upper_half(self.words[REG_W_ROWS_ITER])
  }

  pub fn tot_stores(&self) -> u32 {
    upper_half(self.words[REG_TOT_STORES])
  }

  pub fn start_pulse(&self) -> bool {
    self.start_pulse
  }

  pub fn clear_pulse(&self) -> bool {
    self.clear_pulse
  }

  pub fn done(&self) -> bool {
    self.done
  }

  /// One flag per requesting context
  pub fn events(&self) -> u8 {
    self.events
  }

  pub fn words(&self) -> &[u32; NUM_REGS] {
    &self.words
  }

  /// Retire the pulses the controller consumed this cycle
  pub fn tick(&mut self) {
    self.start_pulse = false;
    self.clear_pulse = false;
  }

  /// Status coming back from the controller
  pub fn set_status(&mut self, busy: bool, done: bool) {
    self.busy = busy;
    if done && !self.done {
      self.done = true;
      self.events |= 1 << (self.starter as usize % MAX_REQUESTERS);
      debug!("{}: done, event raised for requester {}", self.name, self.starter);
    }
  }

  pub fn write(&mut self, idx: usize, data: u32, be: u8, id: u8) {
    if idx >= NUM_REGS {
      return;
    }
    let mask = byte_mask(be);
    match idx {
      REG_CTRL => {
        let bits = data & mask;
        if bits & CTRL_START != 0 {
          self.start_pulse = true;
          self.starter = id;
          self.done = false;
        }
        if bits & CTRL_CLEAR != 0 {
          self.clear_pulse = true;
        }
      },
      REG_STATUS => {},
      _ => {
        self.words[idx] = (self.words[idx] & !mask) | (data & mask);
      },
    }
    trace!("{}: write r{} <= {:#010x} be={:#x} id={}", self.name, idx, data, be, id);
  }

  pub fn read(&mut self, idx: usize, id: u8) -> u32 {
    match idx {
      REG_STATUS => {
        self.events &= !(1 << (id as usize % MAX_REQUESTERS));
        let mut status = 0;
        if self.done {
          status |= STATUS_DONE;
        }
        if self.busy {
          status |= STATUS_BUSY;
        }
        status
      },
      REG_CTRL => 0,
      i if i < NUM_REGS => self.words[i],
      _ => 0,
    }
  }
}

impl Module for RegFile {
  fn run(&mut self) {
    match self.req.get().copied() {
      Some(req) => {
        let idx = (req.addr >> 2) as usize;
        if req.we {
          self.write(idx, req.data, req.be, req.id);
          self.resp.clear();
        } else {
          let data = self.read(idx, req.id);
          self.resp.set(NarrowResp { data, id: req.id });
        }
      },
      None => self.resp.clear(),
    }
  }

  fn reset(&mut self) {
    self.req = Wire::default();
    self.resp = Wire::default();
    self.words = [0; NUM_REGS];
    self.start_pulse = false;
    self.clear_pulse = false;
    self.starter = 0;
    self.done = false;
    self.busy = false;
    self.events = 0;
  }

  fn name(&self) -> &str {
    &self.name
  }
}
