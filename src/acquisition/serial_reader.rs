//! Acquisition loop: owns the read link and feeds the sample buffer.
//!
//! ```text
//! Disconnected ──start──▶ Connecting ──open ok──▶ Streaming
//!       ▲                     │                       │
//!       └──── open failed ────┘◀── I/O error / EOF ───┘
//! ```
//!
//! There is no automatic reconnection: a failed open or a lost link leaves
//! the loop in `Disconnected` until the process restarts. Read timeouts and
//! malformed lines are counted and skipped, as is any run of more than
//! [`MAX_FRAME_BYTES`] without a line terminator.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::frame_parser::parse_line;
use super::ports::{Connector, PortSettings};
use super::sample_buffer::SampleBuffer;
use super::LinkError;
use crate::config::defaults::MAX_FRAME_BYTES;

/// Connection state of the read link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcquisitionState {
    Disconnected,
    Connecting,
    Streaming,
}

impl AcquisitionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Streaming => 2,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Streaming,
            _ => Self::Disconnected,
        }
    }
}

/// Counters accumulated since the loop started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionStats {
    pub lines_read: u64,
    pub frames_accepted: u64,
    pub frames_rejected: u64,
    pub read_timeouts: u64,
}

/// State visible to both the reader thread and its owner.
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    lines_read: AtomicU64,
    frames_accepted: AtomicU64,
    frames_rejected: AtomicU64,
    read_timeouts: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(AcquisitionState::Disconnected.as_u8()),
            lines_read: AtomicU64::new(0),
            frames_accepted: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            read_timeouts: AtomicU64::new(0),
        }
    }

    fn set_state(&self, state: AcquisitionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn state(&self) -> AcquisitionState {
        AcquisitionState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Background reader for the accelerometer link.
///
/// Exactly one reader thread is ever spawned per instance; further calls to
/// [`start`](Self::start) are no-ops.
pub struct AcquisitionLoop {
    settings: PortSettings,
    connector: Arc<dyn Connector>,
    buffer: Arc<SampleBuffer>,
    shared: Arc<Shared>,
    started: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl AcquisitionLoop {
    pub fn new(
        settings: PortSettings,
        connector: Arc<dyn Connector>,
        buffer: Arc<SampleBuffer>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            connector,
            buffer,
            shared: Arc::new(Shared::new()),
            started: AtomicBool::new(false),
            handle: Mutex::new(None),
            cancel,
        }
    }

    /// Spawn the reader thread. Returns `false` if it was already started.
    pub fn start(&self) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(port = %self.settings.name, "Acquisition already running, start ignored");
            return false;
        }

        self.shared.set_state(AcquisitionState::Connecting);
        let reader = Reader {
            settings: self.settings.clone(),
            connector: Arc::clone(&self.connector),
            buffer: Arc::clone(&self.buffer),
            shared: Arc::clone(&self.shared),
            cancel: self.cancel.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || reader.run());
        match spawned {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn acquisition thread");
                self.shared.set_state(AcquisitionState::Disconnected);
            }
        }
        true
    }

    pub fn state(&self) -> AcquisitionState {
        self.shared.state()
    }

    /// True once the read link is open and streaming.
    pub fn is_ready(&self) -> bool {
        self.state() == AcquisitionState::Streaming
    }

    pub fn stats(&self) -> AcquisitionStats {
        let s = &self.shared;
        AcquisitionStats {
            lines_read: s.lines_read.load(Ordering::Relaxed),
            frames_accepted: s.frames_accepted.load(Ordering::Relaxed),
            frames_rejected: s.frames_rejected.load(Ordering::Relaxed),
            read_timeouts: s.read_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Signal the reader to stop and wait for it.
    ///
    /// Blocks for at most one read timeout.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Acquisition thread panicked");
            }
        }
    }
}

/// Everything the reader thread owns.
struct Reader {
    settings: PortSettings,
    connector: Arc<dyn Connector>,
    buffer: Arc<SampleBuffer>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Reader {
    fn run(self) {
        let port = match self.connector.open(&self.settings) {
            Ok(port) => port,
            Err(e) => {
                error!(port = %self.settings.name, error = %e, "Read port unavailable, acquisition stopped");
                self.shared.set_state(AcquisitionState::Disconnected);
                return;
            }
        };
        info!(port = %self.settings.name, baud = self.settings.baud_rate, "Acquisition streaming");
        self.shared.set_state(AcquisitionState::Streaming);

        let mut reader = BufReader::new(port);
        let mut line = Vec::with_capacity(256);

        while !self.cancel.is_cancelled() {
            // `line` never exceeds the limit here, so the budget is at least one byte.
            let budget = (MAX_FRAME_BYTES + 1).saturating_sub(line.len()) as u64;
            match (&mut reader).take(budget).read_until(b'\n', &mut line) {
                Ok(0) => {
                    warn!(port = %self.settings.name, "Read port closed by device");
                    break;
                }
                Ok(_) if line.len() > MAX_FRAME_BYTES => {
                    self.shared.frames_rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(port = %self.settings.name, bytes = line.len(), "Discarding overlong line");
                    line.clear();
                }
                Ok(_) => {
                    self.handle_line(&line);
                    line.clear();
                }
                // Partial bytes stay in `line` and are completed by the next read.
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    self.shared.read_timeouts.fetch_add(1, Ordering::Relaxed);
                    trace!(port = %self.settings.name, "Read timed out");
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    let err = LinkError::Read {
                        port: self.settings.name.clone(),
                        source: e,
                    };
                    error!(error = %err, "Acquisition stopped");
                    break;
                }
            }
        }

        self.shared.set_state(AcquisitionState::Disconnected);
        info!(port = %self.settings.name, "Acquisition loop exited");
    }

    fn handle_line(&self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.shared.lines_read.fetch_add(1, Ordering::Relaxed);
        trace!(line = %text, "Line received");

        match parse_line(text, Instant::now()) {
            Some(sample) => {
                self.buffer.push(sample);
                self.shared.frames_accepted.fetch_add(1, Ordering::Relaxed);
                trace!(buffered = self.buffer.len(), "Sample stored");
            }
            None => {
                self.shared.frames_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(line = %text, "Discarding malformed frame");
            }
        }
    }
}
