//! Duplicate-command suppression at 0.01 Hz resolution
//!
//! Commands are compared in their wire form, so two requests are duplicates
//! exactly when the device would receive the same bytes.

use super::format_command;

/// Remembers the last command accepted for transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFilter {
    last_command: Option<String>,
}

impl CommandFilter {
    pub const fn new() -> Self {
        Self { last_command: None }
    }

    /// True if `hz` would put different bytes on the wire than the last
    /// accepted command.
    pub fn is_new(&self, hz: f64) -> bool {
        self.last_command.as_deref() != Some(format_command(hz).as_str())
    }

    /// Accept `hz` as the latest command.
    pub fn record(&mut self, hz: f64) {
        self.last_command = Some(format_command(hz));
    }

    /// Last accepted value, as transmitted.
    pub fn last(&self) -> Option<f64> {
        self.last_command.as_deref().and_then(|c| c.trim_end().parse().ok())
    }
}
