use core::fmt::{Display, Formatter};

use heapless::Deque;

/// Fault notifications from the core. Faults are tagged, never formatted
/// for the user here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Motor driver reported overcurrent or thermal shutdown.
    EngineDriver,
    /// Speed controller stayed saturated for the whole rise time.
    EngineStalled,
    LaserDriver,
    /// Encoder position at the index pulse was off by more than the tolerance.
    EncoderDesync(u16),
    /// Unexpected TDC status word.
    TdcStatus(u16),
    /// No free sample record, measurement point skipped.
    PoolExhausted,
    /// Processing fell behind, filled record could not be queued.
    QueueOverflow,
    /// Measurement started while the previous one was still in flight.
    ProtocolViolation,
    /// Ranging result arrived with no measurement in flight.
    UnexpectedSample,
    /// SPI or chip select failure talking to the TDC.
    SensorBus,
    /// Reference target not seen, calibration offset not updated.
    MissedCalibration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Reported, scan goes on.
    Warning,
    /// Scan and motor must stop.
    Fatal,
}

impl Fault {
    pub fn severity(&self) -> Severity {
        match self {
            Fault::EngineStalled | Fault::TdcStatus(_) | Fault::MissedCalibration => {
                Severity::Warning
            }
            // Only the current point is lost.
            Fault::PoolExhausted => Severity::Warning,
            Fault::EngineDriver
            | Fault::LaserDriver
            | Fault::EncoderDesync(_)
            | Fault::QueueOverflow
            | Fault::ProtocolViolation
            | Fault::UnexpectedSample
            | Fault::SensorBus => Severity::Fatal,
        }
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match *self {
            Fault::EngineDriver => f.pad("engine driver"),
            Fault::EngineStalled => f.pad("engine stalled"),
            Fault::LaserDriver => f.pad("laser driver"),
            Fault::EncoderDesync(offset) => write!(f, "encoder desync({})", offset),
            Fault::TdcStatus(status) => write!(f, "tdc status({:#06x})", status),
            Fault::PoolExhausted => f.pad("pool exhausted"),
            Fault::QueueOverflow => f.pad("queue overflow"),
            Fault::ProtocolViolation => f.pad("protocol violation"),
            Fault::UnexpectedSample => f.pad("unexpected sample"),
            Fault::SensorBus => f.pad("sensor bus"),
            Fault::MissedCalibration => f.pad("missed calibration"),
        }
    }
}

pub trait FaultSink {
    fn report(&mut self, fault: Fault);
}

/// Bounded fault buffer between interrupt handlers and the supervisor.
/// When full, new faults are counted and dropped so the oldest survive.
pub struct FaultQueue<const N: usize> {
    faults: Deque<Fault, N>,
    dropped: u32,
}

impl<const N: usize> FaultQueue<N> {
    pub const fn new() -> Self {
        Self {
            faults: Deque::new(),
            dropped: 0,
        }
    }

    pub fn pop(&mut self) -> Option<Fault> {
        self.faults.pop_front()
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Faults lost to a full queue since the last call.
    pub fn take_dropped(&mut self) -> u32 {
        core::mem::take(&mut self.dropped)
    }
}

impl<const N: usize> Default for FaultQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FaultSink for FaultQueue<N> {
    fn report(&mut self, fault: Fault) {
        if self.faults.push_back(fault).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_keeps_oldest() {
        let mut queue: FaultQueue<2> = FaultQueue::new();

        queue.report(Fault::PoolExhausted);
        queue.report(Fault::TdcStatus(0x200));
        queue.report(Fault::QueueOverflow);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take_dropped(), 1);
        assert_eq!(queue.take_dropped(), 0);
        assert_eq!(queue.pop(), Some(Fault::PoolExhausted));
        assert_eq!(queue.pop(), Some(Fault::TdcStatus(0x200)));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_severity() {
        assert_eq!(Fault::TdcStatus(0x800).severity(), Severity::Warning);
        assert_eq!(Fault::EngineStalled.severity(), Severity::Warning);
        assert_eq!(Fault::ProtocolViolation.severity(), Severity::Fatal);
        assert_eq!(Fault::QueueOverflow.severity(), Severity::Fatal);
        assert_eq!(Fault::EngineDriver.severity(), Severity::Fatal);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Fault::TdcStatus(0x48)), "tdc status(0x0048)");
        assert_eq!(format!("{}", Fault::QueueOverflow), "queue overflow");
    }
}
