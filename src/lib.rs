//! Course Companion, a study-assistant chat bot.
//!
//! Inbound messages are routed either into an open goal-setting conversation
//! or, by command / menu label / free text, to a reply handler. Profiles live
//! in memory for the life of the process.

pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod handlers;
pub mod keyboard;
pub mod profile;
pub mod router;
