//! Headless session monitor.
//!
//! Polls the pipeline at a fixed cadence: keeps the device driven at the
//! desired frequency, measures what the accelerometer actually sees on the Z
//! axis and records the result. Runs until its cancellation token fires.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Pipeline, ReadingHistory, SessionReading};
use crate::acquisition::AcquisitionState;
use crate::command::SendOutcome;
use crate::config::defaults::READING_HISTORY_LEN;
use crate::types::{Axis, TherapyProfile};

pub struct SessionMonitor {
    pipeline: Arc<Pipeline>,
    profile: TherapyProfile,
    desired_hz: f64,
    history: ReadingHistory,
    started: Instant,
    last_state: Option<AcquisitionState>,
}

impl SessionMonitor {
    /// Monitor driving `profile`'s default frequency.
    pub fn new(pipeline: Arc<Pipeline>, profile: TherapyProfile) -> Self {
        Self {
            pipeline,
            profile,
            desired_hz: profile.default_frequency(),
            history: ReadingHistory::new(READING_HISTORY_LEN),
            started: Instant::now(),
            last_state: None,
        }
    }

    pub const fn profile(&self) -> TherapyProfile {
        self.profile
    }

    pub const fn desired_hz(&self) -> f64 {
        self.desired_hz
    }

    pub const fn history(&self) -> &ReadingHistory {
        &self.history
    }

    /// Switch profile and drive its default frequency.
    pub fn select_profile(&mut self, profile: TherapyProfile) -> SendOutcome {
        info!(%profile, hz = profile.default_frequency(), "Therapy profile selected");
        self.profile = profile;
        self.desired_hz = profile.default_frequency();
        self.pipeline.send_frequency(self.desired_hz)
    }

    /// Request a drive frequency, clamped into the profile's range.
    pub fn set_desired(&mut self, hz: f64) -> SendOutcome {
        let clamped = self.profile.clamp(hz);
        if (clamped - hz).abs() > f64::EPSILON {
            warn!(requested = hz, applied = clamped, profile = %self.profile, "Frequency outside profile range, clamped");
        }
        self.desired_hz = clamped;
        self.pipeline.send_frequency(clamped)
    }

    /// Take one reading. Returns `None` while the read link is not streaming.
    pub fn poll(&mut self) -> Option<SessionReading> {
        let state = self.pipeline.acquisition_state();
        if self.last_state != Some(state) {
            if state == AcquisitionState::Streaming {
                info!(?state, "Device streaming");
            } else {
                info!(?state, "Waiting for device");
            }
            self.last_state = Some(state);
        }
        if state != AcquisitionState::Streaming {
            return None;
        }

        // Suppressed when unchanged, so this only reaches the port on changes.
        self.pipeline.send_frequency(self.desired_hz);

        let (detected_hz, peak_g, samples) = self.pipeline.measure(Axis::Z, Some(self.desired_hz));
        let reading = SessionReading {
            timestamp: Utc::now(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            profile: self.profile,
            desired_hz: self.desired_hz,
            detected_hz,
            peak_g,
            displacement_cm: self.pipeline.estimate_displacement_cm(peak_g, detected_hz),
            samples,
        };
        debug!(
            detected_hz = reading.detected_hz,
            peak_g = reading.peak_g,
            displacement_cm = reading.displacement_cm,
            samples,
            "Session reading"
        );
        self.history.push(reading.clone());
        Some(reading)
    }

    /// Poll every `interval` until `cancel` fires, handing each reading to `sink`.
    ///
    /// Each poll runs on the blocking pool: it may open or write the serial
    /// command port.
    pub async fn run<F>(self, interval: std::time::Duration, cancel: CancellationToken, mut sink: F) -> ReadingHistory
    where
        F: FnMut(&SessionReading) + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(profile = %self.profile, hz = self.desired_hz, "Session monitor started");
        let mut monitor = self;
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Session monitor stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let polled = tokio::task::spawn_blocking(move || {
                        let reading = monitor.poll();
                        (monitor, reading)
                    })
                    .await;
                    let reading = match polled {
                        Ok((returned, reading)) => {
                            monitor = returned;
                            reading
                        }
                        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                        Err(e) => {
                            error!(error = %e, "Session poll aborted, monitor stopping");
                            return ReadingHistory::new(READING_HISTORY_LEN);
                        }
                    };
                    if let Some(reading) = reading {
                        sink(&reading);
                    }
                }
            }
        }

        if let Some(mean) = monitor.history.mean_detected_hz() {
            info!(readings = monitor.history.len(), mean_detected_hz = mean, "Session summary");
        }
        monitor.history
    }
}
