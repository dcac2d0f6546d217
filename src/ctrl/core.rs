use std::io;

use super::controller::{CtrlConfig, CtrlInputs, CtrlOutputs, CtrlState};
use crate::regfile::RegSnapshot;

/// Everything the controller drives in one cycle, including the signals it
/// only forwards from the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtrlPorts {
  pub outputs: CtrlOutputs,
  /// Per-requester event flags, unmodified
  pub events: u8,
  /// Copy of the register file for downstream blocks
  pub regs: RegSnapshot,
}

/// A clocked controller. Implemented directly and on top of the DEVS engine.
pub trait CtrlCore {
  fn tile_height(&self) -> u32;

  /// Advance one clock edge
  fn clock(&mut self, inputs: &CtrlInputs, cfg: &CtrlConfig) -> io::Result<CtrlOutputs>;

  fn snapshot(&self) -> CtrlState;

  fn reset(&mut self);

  /// Clock against the register file as it is this cycle
  fn clock_regs(&mut self, inputs: &CtrlInputs, regs: &RegSnapshot) -> io::Result<CtrlPorts> {
    let cfg = regs.config(self.tile_height());
    let outputs = self.clock(inputs, &cfg)?;
    Ok(CtrlPorts {
      outputs,
      events: regs.events,
      regs: *regs,
    })
  }
}
