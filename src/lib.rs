//! ParkiMotion: Vibration-Therapy Device Link
//!
//! Acquires the accelerometer stream of a vibration-therapy device over a
//! serial link, estimates the dominant oscillation frequency and peak
//! amplitude in the therapy band, and relays the desired drive frequency
//! back to the device.
//!
//! ## Architecture
//!
//! - **Acquisition**: frame parser, sample ring buffer, background reader
//! - **Processing**: Butterworth bandpass, zero-phase filtering, windowed FFT
//! - **Command**: deduplicated drive-frequency commands on the write link
//! - **Pipeline**: facade over the above plus the headless session monitor

pub mod acquisition;
pub mod command;
pub mod config;
pub mod pipeline;
pub mod processing;
pub mod types;

// Re-export configuration
pub use config::PipelineConfig;

// Re-export commonly used types
pub use types::{Axis, Sample, TherapyProfile};

// Re-export link components
pub use acquisition::{
    AcquisitionState, AcquisitionStats, Connector, LinkError, MemoryConnector, SampleBuffer,
    SerialConnector,
};
pub use command::{CommandChannel, SendOutcome};

// Re-export analysis
pub use processing::{estimate_displacement_cm, FilteredSeries, ProcessingError, SpectralAnalyzer, Spectrum};

// Re-export pipeline
pub use pipeline::{Pipeline, PipelineStatus, ReadingHistory, SessionMonitor, SessionReading};
