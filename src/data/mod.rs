//! Market data: trades, the rolling price window and the shared state file

mod state;
mod trade;
mod window;

pub use state::*;
pub use trade::*;
pub use window::*;
