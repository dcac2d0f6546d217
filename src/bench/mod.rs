pub mod engine;
pub mod load_unit;
pub mod top;
pub mod zbuffer;

use serde::{Deserialize, Serialize};

pub use engine::{Engine, EngineCmd};
pub use load_unit::{LoadCmd, LoadUnit};
pub use top::{CycleTrace, RunReport, Top, HOST_ID};
pub use zbuffer::{ZBufCmd, ZBuffer};

/// Job and collaborator timing for one bench run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
  pub tile_height: u32,
  pub rows_per_iter: u32,
  pub tot_stores: u32,
  pub test_mode: bool,
  /// Cycles between two weight rows
  pub row_interval: u32,
  /// Cycles between two pipeline beats
  pub pipe_interval: u32,
  /// Cycles per drained output row
  pub store_interval: u32,
  pub zbuf_depth: u32,
  pub max_cycles: u64,
  /// Assert the global clear at this cycle
  pub clear_at: Option<u64>,
}

impl Default for BenchConfig {
  fn default() -> Self {
    Self {
      tile_height: 4,
      rows_per_iter: 4,
      tot_stores: 1,
      test_mode: false,
      row_interval: 1,
      pipe_interval: 1,
      store_interval: 1,
      zbuf_depth: 4,
      max_cycles: 10_000,
      clear_at: None,
    }
  }
}
