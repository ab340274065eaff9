//! Wall-clock overlay plugin for Skyview.
//!
//! Reports itself ready through the connector when the host initializes, and
//! labels every rendered view with the current time.

pub mod hooks;
pub mod plugin;

pub use plugin::{ClockPlugin, ENTRY_POINT};
