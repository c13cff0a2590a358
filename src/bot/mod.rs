//! Bot runtime: per-user lanes, message handling, and the main loop.

pub mod bot_loop;
pub mod handler;
pub mod lanes;

pub use bot_loop::{Bot, RuntimeConfig};
pub use handler::MessageHandler;
pub use lanes::{LaneProcessor, UserLanes};
