pub mod width_adapter;

pub use width_adapter::{narrow, widen, NarrowReq, NarrowResp, WideReq, WideResp, WidthAdapter};
