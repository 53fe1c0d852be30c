//! Fixed pool of sample records with a FIFO of filled ones.
//!
//! Records are addressed by [`Handle`], which is neither `Clone` nor `Copy`:
//! whoever holds the handle owns the record. The acquisition gets a handle
//! from [`SamplePool::acquire`], fills the record and gives the handle away
//! with [`SamplePool::submit`]. Processing picks it up with
//! [`SamplePool::take`] and returns it with [`SamplePool::release`].

use heapless::Deque;

use crate::angle::Increment;

/// Most time samples one measurement point can hold.
pub const MAX_RAWDATA_LENGTH: usize = 25;
/// Default pool size.
pub const QUEUE_LENGTH: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleRecord {
    /// Encoder position the measurement was taken at.
    pub increments: Increment,
    /// Reference clock calibration active for this measurement.
    pub resonator_calibration: u32,
    pub expected_points: u32,
    pub raw_ctr: u32,
    pub raw: [u32; MAX_RAWDATA_LENGTH],
}

impl SampleRecord {
    pub const EMPTY: SampleRecord = SampleRecord {
        increments: 0,
        resonator_calibration: 0,
        expected_points: 0,
        raw_ctr: 0,
        raw: [0; MAX_RAWDATA_LENGTH],
    };

    pub fn reset(&mut self, increments: Increment, resonator_calibration: u32, expected_points: u32) {
        self.increments = increments;
        self.resonator_calibration = resonator_calibration;
        self.expected_points = expected_points;
        self.raw_ctr = 0;
    }

    /// Appends one time code. Returns false if the record is full.
    pub fn push(&mut self, code: u32) -> bool {
        let index = self.raw_ctr as usize;
        if index >= MAX_RAWDATA_LENGTH || self.raw_ctr >= self.expected_points {
            return false;
        }

        self.raw[index] = code;
        self.raw_ctr += 1;
        true
    }

    pub fn samples(&self) -> &[u32] {
        &self.raw[..(self.raw_ctr as usize).min(MAX_RAWDATA_LENGTH)]
    }

    pub fn missing(&self) -> u32 {
        self.expected_points.saturating_sub(self.raw_ctr)
    }

    pub fn is_complete(&self) -> bool {
        self.raw_ctr >= self.expected_points
    }
}

impl Default for SampleRecord {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Exclusive reference to a pool slot.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    pub fn index(&self) -> usize {
        self.0
    }
}

pub struct SamplePool<const N: usize> {
    slots: [SampleRecord; N],
    in_use: [bool; N],
    queue: Deque<Handle, N>,
    queue_limit: usize,
}

impl<const N: usize> SamplePool<N> {
    pub const fn new() -> Self {
        Self::with_queue_limit(N)
    }

    /// Pool whose FIFO holds at most `limit` filled records. With the
    /// default limit of `N` a submit of an acquired handle always succeeds.
    pub const fn with_queue_limit(limit: usize) -> Self {
        Self {
            slots: [SampleRecord::EMPTY; N],
            in_use: [false; N],
            queue: Deque::new(),
            queue_limit: if limit < N { limit } else { N },
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.in_use.iter().filter(|used| !**used).count()
    }

    /// Number of records waiting for processing.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Takes a free slot. Never blocks.
    pub fn acquire(&mut self) -> Option<Handle> {
        let index = self.in_use.iter().position(|used| !*used)?;
        self.in_use[index] = true;

        Some(Handle(index))
    }

    /// Returns a slot to the pool.
    pub fn release(&mut self, handle: Handle) {
        self.in_use[handle.0] = false;
    }

    pub fn record(&self, handle: &Handle) -> &SampleRecord {
        &self.slots[handle.0]
    }

    pub fn record_mut(&mut self, handle: &Handle) -> &mut SampleRecord {
        &mut self.slots[handle.0]
    }

    /// Queues a filled record for processing. Gives the handle back if the
    /// queue is full.
    pub fn submit(&mut self, handle: Handle) -> Result<(), Handle> {
        if self.queue.len() >= self.queue_limit {
            return Err(handle);
        }
        self.queue.push_back(handle)
    }

    /// Oldest queued record.
    pub fn take(&mut self) -> Option<Handle> {
        self.queue.pop_front()
    }
}

impl<const N: usize> Default for SamplePool<N> {
    fn default() -> Self {
        Self::new()
    }
}
