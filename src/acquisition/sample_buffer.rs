//! Fixed-capacity sample ring buffer shared between the reader and analysts.
//!
//! The acquisition thread is the only writer. Every push publishes a new
//! immutable snapshot through an [`ArcSwap`], so readers grab the current
//! contents without locking and keep a consistent view for as long as they
//! hold it, no matter how many pushes land in the meantime.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::types::Sample;

/// Immutable view of the buffer at one instant, oldest sample first.
pub type Snapshot = Arc<Vec<Sample>>;

#[derive(Debug)]
pub struct SampleBuffer {
    capacity: usize,
    samples: ArcSwap<Vec<Sample>>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: ArcSwap::from_pointee(Vec::with_capacity(capacity)),
        }
    }

    /// Append a sample, evicting the oldest one if the buffer is full.
    pub fn push(&self, sample: Sample) {
        let capacity = self.capacity;
        self.samples.rcu(|current| {
            let keep_from = (current.len() + 1).saturating_sub(capacity).min(current.len());
            let mut next = Vec::with_capacity(capacity.max(1));
            next.extend_from_slice(&current[keep_from..]);
            if capacity > 0 {
                next.push(sample);
            }
            next
        });
    }

    /// Current contents, oldest first. Later pushes do not affect the returned value.
    pub fn snapshot(&self) -> Snapshot {
        self.samples.load_full()
    }

    pub fn clear(&self) {
        self.samples.store(Arc::new(Vec::with_capacity(self.capacity)));
    }

    pub fn len(&self) -> usize {
        self.samples.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.load().is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
