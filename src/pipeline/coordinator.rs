//! Pipeline coordinator - wires acquisition, analysis and commands together.
//!
//! Owns the sample buffer, the acquisition loop on the read link, the
//! spectral analyzer and the command channel on the write link. Every
//! analysis call takes a fresh buffer snapshot, so results never mix samples
//! from before and after a concurrent push.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::PipelineStatus;
use crate::acquisition::{
    AcquisitionLoop, AcquisitionState, Connector, PortSettings, SampleBuffer, Snapshot,
};
use crate::command::{CommandChannel, SendOutcome};
use crate::config::PipelineConfig;
use crate::processing::{
    estimate_displacement_cm, FilteredSeries, ProcessingError, SpectralAnalyzer, Spectrum,
};
use crate::types::Axis;

/// Device link facade used by the session monitor and any presentation layer.
pub struct Pipeline {
    config: PipelineConfig,
    buffer: Arc<SampleBuffer>,
    acquisition: AcquisitionLoop,
    commands: CommandChannel,
    analyzer: SpectralAnalyzer,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline. Nothing is opened until [`start`](Self::start) or the
    /// first [`send_frequency`](Self::send_frequency).
    pub fn new(config: PipelineConfig, connector: impl Connector) -> Result<Self, ProcessingError> {
        Self::with_cancel_token(config, connector, CancellationToken::new())
    }

    /// Like [`new`](Self::new), stopping acquisition when `cancel` fires.
    pub fn with_cancel_token(
        config: PipelineConfig,
        connector: impl Connector,
        cancel: CancellationToken,
    ) -> Result<Self, ProcessingError> {
        let analyzer = SpectralAnalyzer::new(config.analysis)?;
        let connector: Arc<dyn Connector> = Arc::new(connector);
        let buffer = Arc::new(SampleBuffer::new(config.buffer.capacity));

        let serial = &config.serial;
        let read = PortSettings::new(serial.read_port.as_str(), serial.baud_rate, serial.read_timeout());
        let write = PortSettings::new(serial.write_port.as_str(), serial.baud_rate, serial.read_timeout());

        let acquisition = AcquisitionLoop::new(read, Arc::clone(&connector), Arc::clone(&buffer), cancel.clone());
        let commands = CommandChannel::new(write, connector);

        Ok(Self {
            config,
            buffer,
            acquisition,
            commands,
            analyzer,
            cancel,
        })
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start the acquisition loop. Idempotent.
    pub fn start(&self) -> bool {
        self.acquisition.start()
    }

    /// True once the read link is open and streaming.
    pub fn is_ready(&self) -> bool {
        self.acquisition.is_ready()
    }

    pub fn acquisition_state(&self) -> AcquisitionState {
        self.acquisition.state()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.buffer.snapshot()
    }

    pub fn clear_buffer(&self) {
        self.buffer.clear();
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            acquisition: self.acquisition.state(),
            ready: self.acquisition.is_ready(),
            buffered: self.buffer.len(),
            capacity: self.buffer.capacity(),
            stats: self.acquisition.stats(),
            last_command_hz: self.commands.last_sent(),
            command_port_open: self.commands.is_open(),
        }
    }

    // ------------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------------

    pub fn get_filtered_series(&self, axis: Axis, window_secs: f64) -> FilteredSeries {
        self.analyzer.filtered_series(&self.snapshot(), axis, window_secs)
    }

    pub fn get_spectrum(&self, axis: Axis) -> Spectrum {
        self.analyzer.spectrum(&self.snapshot(), axis)
    }

    pub fn get_dominant_frequency(&self, axis: Axis, reference: Option<f64>) -> f64 {
        self.analyzer.dominant_frequency(&self.snapshot(), axis, reference)
    }

    pub fn get_peak_amplitude(&self, axis: Axis) -> f64 {
        self.analyzer.peak_amplitude(&self.snapshot(), axis)
    }

    pub fn estimate_displacement_cm(&self, amplitude_g: f64, frequency_hz: f64) -> f64 {
        estimate_displacement_cm(amplitude_g, frequency_hz)
    }

    /// Dominant frequency, peak amplitude and sample count from one snapshot.
    pub fn measure(&self, axis: Axis, reference: Option<f64>) -> (f64, f64, usize) {
        let snapshot = self.snapshot();
        let detected = self.analyzer.dominant_frequency(&snapshot, axis, reference);
        let peak = self.analyzer.peak_amplitude(&snapshot, axis);
        (detected, peak, snapshot.len())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn send_frequency(&self, hz: f64) -> SendOutcome {
        self.commands.send_frequency(hz)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Stop acquisition, wait for the reader thread and release the write link.
    pub fn shutdown(&self) {
        self.acquisition.shutdown();
        self.commands.close();
        let stats = self.acquisition.stats();
        info!(
            frames = stats.frames_accepted,
            rejected = stats.frames_rejected,
            "Pipeline shut down"
        );
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
