//! Sensor data acquisition module
//!
//! Handles the device read link: opening the port, decoding accelerometer
//! frames, and filling the shared sample ring buffer.

pub mod frame_parser;
pub mod ports;
pub mod sample_buffer;
pub mod serial_reader;

pub use frame_parser::{parse_line, Frame};
pub use ports::{list_ports, probe_port, Connector, MemoryConnector, Port, PortSettings, PortState, SerialConnector};
pub use sample_buffer::{SampleBuffer, Snapshot};
pub use serial_reader::{AcquisitionLoop, AcquisitionState, AcquisitionStats};

use thiserror::Error;

/// Serial link errors
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Failed to open {port}: {source}")]
    PortOpen {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Write to {port} failed: {source}")]
    Transmit {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Read from {port} failed: {source}")]
    Read {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Port enumeration failed: {0}")]
    Enumerate(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}
