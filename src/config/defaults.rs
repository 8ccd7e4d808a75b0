//! System-wide default constants.
//!
//! Centralises the numbers the device firmware and the analysis chain agree on.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Serial Link
// ============================================================================

/// Port the device streams accelerometer frames on.
pub const READ_PORT: &str = "COM6";

/// Port the device accepts drive-frequency commands on.
pub const WRITE_PORT: &str = "COM11";

/// Line speed shared by both links.
pub const BAUD_RATE: u32 = 115_200;

/// Per-read timeout on the acquisition port (ms).
///
/// Bounds how long the reader can stall if the device goes quiet.
pub const READ_TIMEOUT_MS: u64 = 1_000;

/// Longest line (bytes, terminator included) accepted as a frame candidate.
///
/// Firmware frames are about 100 bytes; a longer run without a newline is
/// line noise or a baud mismatch and is discarded.
pub const MAX_FRAME_BYTES: usize = 512;

// ============================================================================
// Sample Buffer
// ============================================================================

/// Ring-buffer capacity (samples). 300 samples at 40 Hz = 7.5 s.
pub const SAMPLE_BUFFER_CAPACITY: usize = 300;

// ============================================================================
// Analysis
// ============================================================================

/// Nominal device sample rate (Hz). Inter-arrival jitter is not corrected.
pub const SAMPLE_RATE_HZ: f64 = 40.0;

/// Lower passband edge of the bandpass filter (Hz).
pub const BAND_LOW_HZ: f64 = 3.0;

/// Upper passband edge of the bandpass filter (Hz).
pub const BAND_HIGH_HZ: f64 = 7.0;

/// Butterworth prototype order. The bandpass transform doubles it.
pub const FILTER_ORDER: usize = 4;

/// Minimum buffered samples before any analysis produces output.
pub const MIN_SAMPLES: usize = 50;

/// Default time window for the filtered series (seconds).
pub const WINDOW_SECS: f64 = 5.0;

/// Width of the dominant-frequency search window around a reference (Hz).
pub const SEARCH_BANDWIDTH_HZ: f64 = 1.0;

/// Standard gravity used to convert g to m/s².
pub const STANDARD_GRAVITY: f64 = 9.81;

// ============================================================================
// Session Monitor
// ============================================================================

/// Poll cadence of the session monitor (ms).
pub const POLL_INTERVAL_MS: u64 = 500;

/// Number of session readings retained for consumers.
pub const READING_HISTORY_LEN: usize = 100;

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "PARKIMOTION_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "parkimotion.toml";
