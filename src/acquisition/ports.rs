//! Serial port abstraction.
//!
//! The acquisition loop and the command channel never touch `serialport`
//! directly; they ask a [`Connector`] for a byte stream. [`SerialConnector`]
//! opens real hardware, [`MemoryConnector`] replays scripted input and
//! records writes for simulation and tests.

use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use super::LinkError;

/// Bidirectional byte stream to the device.
pub trait Port: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Port for T {}

/// Everything needed to open one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub name: String,
    pub baud_rate: u32,
    /// Per-read timeout; reads return `ErrorKind::TimedOut` when it expires
    pub timeout: Duration,
}

impl PortSettings {
    pub fn new(name: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            baud_rate,
            timeout,
        }
    }
}

/// Opens ports by name.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn Port>, LinkError>;
}

/// Open-or-closed state of one link. Opening and closing are the only transitions.
#[derive(Default)]
pub enum PortState {
    #[default]
    Closed,
    Open(Box<dyn Port>),
}

impl PortState {
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

impl std::fmt::Debug for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("Closed"),
            Self::Open(_) => f.write_str("Open"),
        }
    }
}

// ============================================================================
// Hardware
// ============================================================================

/// Opens OS serial devices through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn Port>, LinkError> {
        let port = serialport::new(settings.name.as_str(), settings.baud_rate)
            .timeout(settings.timeout)
            .open()
            .map_err(|e| LinkError::PortOpen {
                port: settings.name.clone(),
                source: e.into(),
            })?;
        debug!(port = %settings.name, baud = settings.baud_rate, "Serial port opened");
        Ok(Box::new(port))
    }
}

/// Names of the serial ports currently visible to the OS.
pub fn list_ports() -> Result<Vec<String>, LinkError> {
    let ports = serialport::available_ports().map_err(|e| LinkError::Enumerate(e.to_string()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Open and immediately release a port to check it is usable.
pub fn probe_port(connector: &dyn Connector, settings: &PortSettings) -> Result<(), LinkError> {
    let port = connector.open(settings)?;
    drop(port);
    info!(port = %settings.name, "Port opened and released");
    Ok(())
}

// ============================================================================
// In-Memory
// ============================================================================

/// Scripted connector: every opened port reads the same input bytes and
/// appends its writes to one shared transcript.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    input: Vec<u8>,
    written: Arc<Mutex<Vec<u8>>>,
    fail_open: AtomicBool,
    fail_writes: Arc<AtomicBool>,
    hang_up_at_end: bool,
    write_delay: Duration,
    opens: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes every opened port will yield before going quiet.
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = input.into();
        self
    }

    /// Report end-of-stream once the input is consumed instead of timing out.
    pub const fn hang_up_at_end(mut self) -> Self {
        self.hang_up_at_end = true;
        self
    }

    /// Make every write block for `delay`, like a congested serial driver.
    pub const fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Everything written to any port opened by this connector.
    pub fn written(&self) -> Vec<u8> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Written bytes split into lines.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Successful opens so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn Port>, LinkError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(LinkError::PortOpen {
                port: settings.name.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
            });
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryPort {
            input: Cursor::new(self.input.clone()),
            timeout: settings.timeout,
            hang_up_at_end: self.hang_up_at_end,
            write_delay: self.write_delay,
            written: Arc::clone(&self.written),
            fail_writes: Arc::clone(&self.fail_writes),
        }))
    }
}

/// Lets a caller keep a handle on a connector it hands to the pipeline.
impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn Port>, LinkError> {
        (**self).open(settings)
    }
}

struct MemoryPort {
    input: Cursor<Vec<u8>>,
    timeout: Duration,
    hang_up_at_end: bool,
    write_delay: Duration,
    written: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.input.read(buf)?;
        if n == 0 && !buf.is_empty() && !self.hang_up_at_end {
            std::thread::sleep(self.timeout);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        Ok(n)
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    fn settings() -> PortSettings {
        PortSettings::new("MEM0", 115_200, Duration::from_millis(5))
    }

    #[test]
    fn memory_port_replays_input_then_times_out() {
        let connector = Arc::new(MemoryConnector::new().with_input("a\nb\n"));
        let port = connector.open(&settings()).unwrap();
        let mut reader = io::BufReader::new(port);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "a\n");
        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "b\n");
        line.clear();
        let err = reader.read_line(&mut line).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn memory_port_records_writes() {
        let connector = Arc::new(MemoryConnector::new());
        let mut port = connector.open(&settings()).unwrap();
        port.write_all(b"5.00\n").unwrap();
        port.write_all(b"6.25\n").unwrap();
        assert_eq!(connector.written_lines(), vec!["5.00", "6.25"]);
        assert_eq!(connector.open_count(), 1);
    }

    #[test]
    fn failing_open_reports_port_name() {
        let connector = Arc::new(MemoryConnector::new());
        connector.set_fail_open(true);
        let err = probe_port(&connector, &settings()).err().unwrap();
        assert!(matches!(err, LinkError::PortOpen { ref port, .. } if port == "MEM0"));
        connector.set_fail_open(false);
        assert!(probe_port(&connector, &settings()).is_ok());
    }

    #[test]
    fn port_state_tracks_open() {
        let connector = Arc::new(MemoryConnector::new());
        let mut state = PortState::default();
        assert!(!state.is_open());
        state = PortState::Open(connector.open(&settings()).unwrap());
        assert!(state.is_open());
    }
}
