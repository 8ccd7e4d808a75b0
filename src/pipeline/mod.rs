//! Device Pipeline Module
//!
//! ```text
//! read port ──▶ AcquisitionLoop ──▶ SampleBuffer ──snapshot──▶ SpectralAnalyzer
//!                 (thread)          (ring, 300)                     │
//!                                                                   ▼
//! write port ◀── CommandChannel ◀── SessionMonitor ◀── dominant Hz / peak g
//! ```
//!
//! [`Pipeline`] owns both links and exposes the analysis and command calls;
//! [`monitor::SessionMonitor`] is the headless consumer that polls it.

mod coordinator;
pub mod monitor;
mod state;

pub use coordinator::Pipeline;
pub use monitor::SessionMonitor;
pub use state::*;
