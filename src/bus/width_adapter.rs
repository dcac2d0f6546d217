/// 64-bit host port to 32-bit register port adapter
use serde::{Deserialize, Serialize};

use crate::builtin::{Module, Wire};

/// Byte-enable pattern that selects the low 32-bit lane
pub const LOW_LANE_BE: u8 = 0x0F;

/// Transaction on the 64-bit application port
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideReq {
  pub addr: u32,
  pub we: bool,
  pub be: u8,
  pub data: u64,
  pub id: u8,
}

/// Transaction on the 32-bit register port
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrowReq {
  pub addr: u32,
  pub we: bool,
  pub be: u8,
  pub data: u32,
  pub id: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrowResp {
  pub data: u32,
  pub id: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideResp {
  pub data: u64,
  pub id: u8,
}

impl WideReq {
  /// 32-bit write placed in the lane picked by `addr & 4`
  pub fn write32(addr: u32, value: u32, id: u8) -> Self {
    let (be, data) = if addr & 4 == 0 {
      (LOW_LANE_BE, value as u64)
    } else {
      (0xF0, (value as u64) << 32)
    };
    Self {
      addr,
      we: true,
      be,
      data,
      id,
    }
  }

  pub fn read32(addr: u32, id: u8) -> Self {
    let be = if addr & 4 == 0 { LOW_LANE_BE } else { 0xF0 };
    Self {
      addr,
      we: false,
      be,
      data: 0,
      id,
    }
  }
}

/// Select the addressed half of a wide transaction
pub fn narrow(req: &WideReq) -> NarrowReq {
  let (be, data) = if req.be == LOW_LANE_BE {
    (req.be & 0x0F, req.data as u32)
  } else {
    (req.be >> 4, (req.data >> 32) as u32)
  };
  NarrowReq {
    addr: req.addr,
    we: req.we,
    be,
    data,
    id: req.id,
  }
}

/// Zero-extend a register port response onto the wide port
pub fn widen(resp: &NarrowResp) -> WideResp {
  WideResp {
    data: resp.data as u64,
    id: resp.id,
  }
}

/// Width Adapter - pure fan-in/fan-out between the two ports, no retained state
pub struct WidthAdapter {
  name: String,

  // Host side
  pub req_in: Wire<WideReq>,
  pub resp_out: Wire<WideResp>,

  // Register file side
  pub narrow_req_out: Wire<NarrowReq>,
  pub narrow_resp_in: Wire<NarrowResp>,
}

impl WidthAdapter {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      req_in: Wire::default(),
      resp_out: Wire::default(),
      narrow_req_out: Wire::default(),
      narrow_resp_in: Wire::default(),
    }
  }
}

impl Module for WidthAdapter {
  fn run(&mut self) {
    match self.req_in.get() {
      Some(req) => {
        let n = narrow(req);
        self.narrow_req_out.set(n);
      },
      None => self.narrow_req_out.clear(),
    }

    match self.narrow_resp_in.get() {
      Some(resp) => {
        let w = widen(resp);
        self.resp_out.set(w);
      },
      None => self.resp_out.clear(),
    }
  }

  fn reset(&mut self) {
    self.req_in = Wire::default();
    self.resp_out = Wire::default();
    self.narrow_req_out = Wire::default();
    self.narrow_resp_in = Wire::default();
  }

  fn name(&self) -> &str {
    &self.name
  }
}
