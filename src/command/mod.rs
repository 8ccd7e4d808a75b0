//! Command channel: relays the desired drive frequency to the device.
//!
//! The channel owns the write link. Each accepted command is written as one
//! line with two decimals (`"5.00\n"`). A value whose line matches the
//! previous one is dropped without touching the port. The port is opened
//! lazily on the first command that needs it; a failed open is logged and the
//! next distinct value retries it.
//!
//! A single mutex covers the dedup state, the port state and the write, so
//! concurrent callers never interleave bytes and the latest request always
//! wins.

mod dedup;

pub use dedup::CommandFilter;

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::acquisition::{Connector, LinkError, PortSettings, PortState};

/// What happened to one `send_frequency` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Written and flushed
    Sent,
    /// Same as the last accepted value at two decimals; nothing written
    Suppressed,
    /// Write port could not be opened; nothing written
    PortUnavailable,
    /// Port was open but the write failed
    TransmitFailed,
    /// Value was NaN or infinite
    Rejected,
}

#[derive(Debug, Default)]
struct ChannelState {
    port: PortState,
    filter: CommandFilter,
}

/// Owner of the write link.
pub struct CommandChannel {
    settings: PortSettings,
    connector: Arc<dyn Connector>,
    state: Mutex<ChannelState>,
}

impl CommandChannel {
    pub fn new(settings: PortSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
            state: Mutex::new(ChannelState::default()),
        }
    }

    /// Send `hz` unless it repeats the last accepted value.
    ///
    /// The value counts as accepted before the port is opened, so repeating
    /// it after a failed open stays suppressed until a different value is
    /// requested.
    pub fn send_frequency(&self, hz: f64) -> SendOutcome {
        if !hz.is_finite() {
            warn!(value = hz, "Ignoring non-finite frequency command");
            return SendOutcome::Rejected;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.filter.is_new(hz) {
            debug!(hz, "Frequency unchanged, command suppressed");
            return SendOutcome::Suppressed;
        }
        state.filter.record(hz);

        if !state.port.is_open() {
            match self.connector.open(&self.settings) {
                Ok(port) => {
                    info!(port = %self.settings.name, "Write port opened");
                    state.port = PortState::Open(port);
                }
                Err(e) => {
                    error!(error = %e, "Write port unavailable, command dropped");
                    return SendOutcome::PortUnavailable;
                }
            }
        }

        let line = format_command(hz);
        let PortState::Open(port) = &mut state.port else {
            return SendOutcome::PortUnavailable;
        };
        let written = port.write_all(line.as_bytes()).and_then(|()| port.flush());
        match written {
            Ok(()) => {
                info!(port = %self.settings.name, command = %line.trim_end(), "Frequency sent");
                SendOutcome::Sent
            }
            Err(e) => {
                let err = LinkError::Transmit {
                    port: self.settings.name.clone(),
                    source: e,
                };
                error!(error = %err, "Frequency command not delivered");
                SendOutcome::TransmitFailed
            }
        }
    }

    /// Last value accepted for transmission, as it went on the wire.
    pub fn last_sent(&self) -> Option<f64> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .filter
            .last()
    }

    pub fn is_open(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .port
            .is_open()
    }

    /// Drop the port handle. The next distinct command reopens it.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.port.is_open() {
            debug!(port = %self.settings.name, "Write port closed");
        }
        state.port = PortState::Closed;
    }
}

/// Wire form of a drive-frequency command.
pub fn format_command(hz: f64) -> String {
    format!("{hz:.2}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::MemoryConnector;
    use std::time::Duration;

    fn channel() -> (Arc<MemoryConnector>, CommandChannel) {
        let connector = Arc::new(MemoryConnector::new());
        let settings = PortSettings::new("MEM-WRITE", 115_200, Duration::from_millis(5));
        let channel = CommandChannel::new(settings, Arc::clone(&connector) as Arc<dyn Connector>);
        (connector, channel)
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_command(5.0), "5.00\n");
        assert_eq!(format_command(3.456), "3.46\n");
        assert_eq!(format_command(6.5), "6.50\n");
    }

    #[test]
    fn opens_lazily_and_writes_line() {
        let (connector, channel) = channel();
        assert!(!channel.is_open());
        assert_eq!(connector.open_count(), 0);

        assert_eq!(channel.send_frequency(5.0), SendOutcome::Sent);
        assert!(channel.is_open());
        assert_eq!(connector.written(), b"5.00\n");
    }

    #[test]
    fn repeated_value_is_written_once() {
        let (connector, channel) = channel();
        assert_eq!(channel.send_frequency(5.0), SendOutcome::Sent);
        assert_eq!(channel.send_frequency(5.0), SendOutcome::Suppressed);
        assert_eq!(channel.send_frequency(5.004), SendOutcome::Suppressed);
        assert_eq!(channel.send_frequency(5.5), SendOutcome::Sent);
        assert_eq!(channel.send_frequency(5.0), SendOutcome::Sent);
        assert_eq!(connector.written_lines(), vec!["5.00", "5.50", "5.00"]);
        assert_eq!(connector.open_count(), 1);
    }

    #[test]
    fn halfway_value_is_judged_by_its_wire_text() {
        let (connector, channel) = channel();
        assert_eq!(channel.send_frequency(5.12), SendOutcome::Sent);
        // Prints as "5.12", the command already on the device.
        assert_eq!(channel.send_frequency(5.125), SendOutcome::Suppressed);
        assert_eq!(channel.send_frequency(5.13), SendOutcome::Sent);
        assert_eq!(connector.written_lines(), vec!["5.12", "5.13"]);
        assert_eq!(channel.last_sent(), Some(5.13));
    }

    #[test]
    fn failed_open_drops_command_and_retries_on_next_value() {
        let (connector, channel) = channel();
        connector.set_fail_open(true);
        assert_eq!(channel.send_frequency(5.0), SendOutcome::PortUnavailable);
        assert!(!channel.is_open());

        connector.set_fail_open(false);
        // Same value stays suppressed: it was already accepted.
        assert_eq!(channel.send_frequency(5.0), SendOutcome::Suppressed);
        assert_eq!(channel.send_frequency(6.0), SendOutcome::Sent);
        assert_eq!(connector.written_lines(), vec!["6.00"]);
    }

    #[test]
    fn transmit_failure_keeps_port_state() {
        let (connector, channel) = channel();
        assert_eq!(channel.send_frequency(4.0), SendOutcome::Sent);
        connector.set_fail_writes(true);
        assert_eq!(channel.send_frequency(4.5), SendOutcome::TransmitFailed);
        assert!(channel.is_open());

        connector.set_fail_writes(false);
        assert_eq!(channel.send_frequency(4.75), SendOutcome::Sent);
        assert_eq!(connector.written_lines(), vec!["4.00", "4.75"]);
        assert_eq!(connector.open_count(), 1);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let (connector, channel) = channel();
        assert_eq!(channel.send_frequency(f64::NAN), SendOutcome::Rejected);
        assert_eq!(channel.send_frequency(f64::INFINITY), SendOutcome::Rejected);
        assert_eq!(channel.last_sent(), None);
        assert!(connector.written().is_empty());
    }

    #[test]
    fn close_forces_reopen() {
        let (connector, channel) = channel();
        channel.send_frequency(3.5);
        channel.close();
        assert!(!channel.is_open());
        channel.send_frequency(3.75);
        assert_eq!(connector.open_count(), 2);
        assert_eq!(channel.last_sent(), Some(3.75));
    }

    #[test]
    fn concurrent_senders_never_interleave() {
        let (connector, channel) = channel();
        let channel = Arc::new(channel);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let channel = Arc::clone(&channel);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        channel.send_frequency(f64::from(t * 100 + i) / 10.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for line in connector.written_lines() {
            let (whole, frac) = line.split_once('.').unwrap();
            assert!(whole.parse::<u32>().is_ok(), "bad line {line:?}");
            assert_eq!(frac.len(), 2, "bad line {line:?}");
        }
    }

    mod proptest_channel {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// One write per run of requests that agree at two decimals, and
            /// never the same line twice in a row.
            #[test]
            fn one_write_per_run(
                runs in proptest::collection::vec(
                    (1u32..2_000, proptest::collection::vec(-0.004f64..0.004, 1..5)),
                    1..20,
                ),
            ) {
                let (connector, channel) = channel();
                let mut expected: Vec<String> = Vec::new();
                for (centi, jitters) in &runs {
                    let line = format!("{}.{:02}", centi / 100, centi % 100);
                    if expected.last() != Some(&line) {
                        expected.push(line);
                    }
                    for jitter in jitters {
                        channel.send_frequency(f64::from(*centi) / 100.0 + jitter);
                    }
                }
                let written = connector.written_lines();
                prop_assert!(written.windows(2).all(|w| w[0] != w[1]));
                prop_assert_eq!(written, expected);
            }

            /// Arbitrary requests, halfway values included, never repeat a line.
            #[test]
            fn consecutive_lines_always_differ(
                requests in proptest::collection::vec(0.0f64..20.0, 1..40),
            ) {
                let (connector, channel) = channel();
                for hz in &requests {
                    channel.send_frequency(*hz);
                    channel.send_frequency((hz * 1_000.0).round() / 1_000.0);
                }
                let written = connector.written_lines();
                prop_assert!(written.windows(2).all(|w| w[0] != w[1]), "{:?}", written);
            }
        }
    }
}
