//! Decision fusion and the bounded alert log
//!
//! - `decision`: one fused verdict per cycle from the three signals
//! - `alert_log`: capacity-bounded history written to the shared state

mod alert_log;
mod decision;

pub use alert_log::*;
pub use decision::*;
