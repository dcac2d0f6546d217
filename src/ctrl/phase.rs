use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the tile sequencer. `Finished` always falls back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
  #[default]
  Idle,
  Starting,
  Computing,
  Buffering,
  Storing,
  Finished,
}

impl Phase {
  pub const ALL: [Phase; 6] = [
    Phase::Idle,
    Phase::Starting,
    Phase::Computing,
    Phase::Buffering,
    Phase::Storing,
    Phase::Finished,
  ];

  pub fn is_busy(self) -> bool {
    !matches!(self, Phase::Idle | Phase::Finished)
  }

  /// Weight rows only flow once the first load has landed
  pub fn shifts_weights(self) -> bool {
    !matches!(self, Phase::Idle | Phase::Starting)
  }

  pub fn index(self) -> usize {
    self as usize
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Phase::Idle => "idle",
      Phase::Starting => "starting",
      Phase::Computing => "computing",
      Phase::Buffering => "buffering",
      Phase::Storing => "storing",
      Phase::Finished => "finished",
    };
    f.write_str(s)
  }
}
