//! Handoff tracker — measures how long customers wait for a human agent
//! after picking a sector in the chat bot menu.

pub mod channels;
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod working_time;
