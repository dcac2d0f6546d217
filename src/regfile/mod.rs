pub mod regfile;

pub use regfile::{
  reg_addr, RegFile, RegSnapshot, CTRL_CLEAR, CTRL_START, MAX_REQUESTERS, NUM_REGS, REG_CTRL, REG_STATUS, REG_TOT_STORES,
  REG_W_ROWS_ITER, STATUS_BUSY, STATUS_DONE,
};
