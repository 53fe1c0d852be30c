//! Sample records to calibrated azimuth/distance points.

use libm::roundf;

use gp22::{HS_CRYSTAL_FREQ, RESONATOR_CYCLES, RESONATOR_FREQ};

use crate::angle::{self, Increment, TenthDegree};
use crate::config::REFERENCE_AZIMUTH;
use crate::encode::{self, NO_DISTANCE, POINT_LENGTH};
use crate::record::{Handle, SamplePool, SampleRecord};

/// m/s
pub const SPEED_OF_LIGHT: f32 = 299_792_458.0;

/// Time code of the largest distance the stream can carry. Stands in for
/// every missing sample in the mean.
pub const TIMEOUT_PENALTY: u32 = 7162;

/// Largest distance reported as a valid measurement, in millimetres.
pub const MAX_DISTANCE: u16 = NO_DISTANCE - 1;

/// Distance to the calibration target, in millimetres.
pub const REFERENCE_DISTANCE: i16 = 60;

// Result registers are 16.16 fixed point.
const RESULT_SCALE: f32 = 65535.0;
const CALIBRATION_SCALE: f32 = 65536.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessingConfig {
    /// Encoder position of the calibration target.
    pub reference: Increment,
    pub reference_distance: i16,
    /// Sensor specific linear correction.
    pub scale: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            reference: angle::to_increments(REFERENCE_AZIMUTH),
            reference_distance: REFERENCE_DISTANCE,
            scale: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub azimuth: TenthDegree,
    /// Millimetres, [`NO_DISTANCE`] if nothing reflected.
    pub distance: u16,
}

impl Point {
    pub fn encode(&self) -> [u8; POINT_LENGTH] {
        encode::encode(self.azimuth, self.distance)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Output {
    Point(Point),
    /// Reference target measured, new offset in millimetres.
    Calibrated(i16),
    /// Reference target gave no reflection, offset unchanged.
    MissedCalibration,
}

/// Mean time code of a record, or `None` if less than half of the pulses
/// came back.
pub fn mean_code(record: &SampleRecord) -> Option<u32> {
    if record.raw_ctr * 2 <= record.expected_points {
        return None;
    }

    let sum: u64 = record.samples().iter().map(|&code| code as u64).sum();
    let penalty = record.missing() as u64 * TIMEOUT_PENALTY as u64;

    Some(((sum + penalty) / record.expected_points as u64) as u32)
}

/// Reference clock correction for a resonator calibration code.
pub fn drift_factor(resonator_calibration: u32) -> f32 {
    if resonator_calibration == 0 {
        return 1.0;
    }

    let expected = RESONATOR_CYCLES as f32 / RESONATOR_FREQ as f32;
    let measured = resonator_calibration as f32 / CALIBRATION_SCALE / HS_CRYSTAL_FREQ as f32;

    expected / measured
}

pub struct Processor {
    config: ProcessingConfig,
    resonator_calibration: u32,
    drift_factor: f32,
    offset: i16,
}

impl Processor {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config,
            resonator_calibration: 0,
            drift_factor: 1.0,
            offset: 0,
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Current propagation delay offset, in millimetres.
    pub fn offset(&self) -> i16 {
        self.offset
    }

    pub fn drift_factor(&self) -> f32 {
        self.drift_factor
    }

    /// Consumes one record and returns it to the pool.
    pub fn process<const N: usize>(&mut self, pool: &mut SamplePool<N>, handle: Handle) -> Output {
        let record = pool.record(&handle);
        let increments = record.increments;
        let resonator_calibration = record.resonator_calibration;
        let mean = mean_code(record);
        pool.release(handle);

        self.convert(increments, resonator_calibration, mean)
    }

    /// Same as [`Processor::process`] for a record already copied out of
    /// the pool.
    pub fn process_record(&mut self, record: &SampleRecord) -> Output {
        self.convert(
            record.increments,
            record.resonator_calibration,
            mean_code(record),
        )
    }

    fn convert(
        &mut self,
        increments: Increment,
        resonator_calibration: u32,
        mean: Option<u32>,
    ) -> Output {
        if resonator_calibration != self.resonator_calibration {
            self.resonator_calibration = resonator_calibration;
            self.drift_factor = drift_factor(resonator_calibration);
        }

        let distance = match mean {
            Some(mean) => self.to_millimetres(mean),
            None => NO_DISTANCE,
        };

        if increments == self.config.reference {
            if distance == NO_DISTANCE {
                return Output::MissedCalibration;
            }

            self.offset = distance as i16 - self.config.reference_distance;
            return Output::Calibrated(self.offset);
        }

        let distance = if distance == NO_DISTANCE {
            distance
        } else {
            num::clamp(distance as i32 - self.offset as i32, 0, MAX_DISTANCE as i32) as u16
        };

        Output::Point(Point {
            azimuth: angle::to_tenth_degree(increments),
            distance,
        })
    }

    fn to_millimetres(&self, mean: u32) -> u16 {
        let periods = mean as f32 / RESULT_SCALE * self.drift_factor;
        let seconds = periods / HS_CRYSTAL_FREQ as f32;
        let millimetres = roundf(seconds * SPEED_OF_LIGHT / 2.0 * 1000.0 * self.config.scale);

        if millimetres >= NO_DISTANCE as f32 {
            NO_DISTANCE
        } else if millimetres <= 0.0 {
            0
        } else {
            millimetres as u16
        }
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(ProcessingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Time code of 1000 mm with a nominal clock.
    const CODE_1000MM: u32 = 1749;
    // 160 mm, 100 mm past the calibration target.
    const CODE_160MM: u32 = 280;

    fn submit<const N: usize>(
        pool: &mut SamplePool<N>,
        increments: Increment,
        calibration: u32,
        expected: u32,
        codes: &[u32],
    ) -> Handle {
        let handle = pool.acquire().unwrap();
        let record = pool.record_mut(&handle);
        record.reset(increments, calibration, expected);
        for &code in codes {
            assert!(record.push(code));
        }
        handle
    }

    #[test]
    fn test_missing_sample_bias() {
        let mut record = SampleRecord::EMPTY;
        record.reset(500, 0, 10);
        for _ in 0..6 {
            record.push(1000);
        }

        assert_eq!(mean_code(&record), Some((6 * 1000 + 4 * TIMEOUT_PENALTY) / 10));

        // Half or less is no reflection.
        record.reset(500, 0, 10);
        for _ in 0..5 {
            record.push(1000);
        }
        assert_eq!(mean_code(&record), None);

        record.reset(500, 0, 0);
        assert_eq!(mean_code(&record), None);
    }

    #[test]
    fn test_drift_factor() {
        assert_eq!(drift_factor(0), 1.0);
        assert!((drift_factor(16_000_000) - 1.0).abs() < 1e-3);
        // Slow reference clock counts less for the same resonator time.
        assert!(drift_factor(15_000_000) > 1.0);
    }

    #[test]
    fn test_penalty_is_max_distance() {
        let processor = Processor::default();

        assert_eq!(processor.to_millimetres(TIMEOUT_PENALTY), NO_DISTANCE);
        assert!(processor.to_millimetres(TIMEOUT_PENALTY - 2) < NO_DISTANCE);
        assert_eq!(processor.to_millimetres(CODE_1000MM), 1000);
    }

    #[test]
    fn test_releases_record() {
        let mut pool: SamplePool<2> = SamplePool::new();
        let mut processor = Processor::default();

        let handle = submit(&mut pool, 1000, 0, 4, &[CODE_1000MM; 4]);
        assert_eq!(pool.available(), 1);

        let output = processor.process(&mut pool, handle);
        assert_eq!(pool.available(), 2);
        assert_eq!(
            output,
            Output::Point(Point {
                azimuth: 0,
                distance: 1000
            })
        );
    }

    #[test]
    fn test_copied_record() {
        let mut processor = Processor::default();
        let mut record = SampleRecord::EMPTY;
        record.reset(1000, 16_000_000, 2);
        record.push(CODE_1000MM);
        record.push(CODE_1000MM);

        assert_eq!(
            processor.process_record(&record),
            Output::Point(Point {
                azimuth: 0,
                distance: 1000
            })
        );
    }

    #[test]
    fn test_offset_idempotent() {
        let mut pool: SamplePool<4> = SamplePool::new();
        let mut processor = Processor::default();
        let reference = processor.config().reference;

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let handle = submit(&mut pool, reference, 16_000_000, 25, &[CODE_160MM; 25]);
            outputs.push(processor.process(&mut pool, handle));
            let handle = submit(&mut pool, 340, 16_000_000, 25, &[CODE_1000MM; 25]);
            outputs.push(processor.process(&mut pool, handle));
        }

        assert_eq!(outputs[0], Output::Calibrated(100));
        assert_eq!(
            outputs[1],
            Output::Point(Point {
                azimuth: -1188,
                distance: 900
            })
        );
        assert_eq!(outputs[0..2], outputs[2..4]);
        assert_eq!(processor.offset(), 100);
    }

    #[test]
    fn test_missed_calibration_keeps_offset() {
        let mut pool: SamplePool<4> = SamplePool::new();
        let mut processor = Processor::default();
        let reference = processor.config().reference;

        let handle = submit(&mut pool, reference, 0, 25, &[CODE_160MM; 25]);
        assert_eq!(processor.process(&mut pool, handle), Output::Calibrated(100));

        let handle = submit(&mut pool, reference, 0, 25, &[CODE_160MM; 3]);
        assert_eq!(processor.process(&mut pool, handle), Output::MissedCalibration);
        assert_eq!(processor.offset(), 100);
    }

    #[test]
    fn test_sentinel_not_corrected() {
        let mut pool: SamplePool<4> = SamplePool::new();
        let mut processor = Processor::default();
        let reference = processor.config().reference;

        let handle = submit(&mut pool, reference, 0, 25, &[CODE_160MM; 25]);
        processor.process(&mut pool, handle);

        // No reflection stays at the sentinel.
        let handle = submit(&mut pool, 1000, 0, 25, &[]);
        assert_eq!(
            processor.process(&mut pool, handle),
            Output::Point(Point {
                azimuth: 0,
                distance: NO_DISTANCE
            })
        );

        // Closer than the offset clamps to zero.
        let handle = submit(&mut pool, 1000, 0, 25, &[100; 25]);
        assert_eq!(
            processor.process(&mut pool, handle),
            Output::Point(Point {
                azimuth: 0,
                distance: 0
            })
        );
    }

    #[test]
    fn test_negative_offset_caps_below_sentinel() {
        let mut pool: SamplePool<4> = SamplePool::new();
        let mut processor = Processor::new(ProcessingConfig {
            reference_distance: 200,
            ..ProcessingConfig::default()
        });
        let reference = processor.config().reference;

        let handle = submit(&mut pool, reference, 0, 25, &[CODE_160MM; 25]);
        assert_eq!(processor.process(&mut pool, handle), Output::Calibrated(-40));

        let handle = submit(&mut pool, 1000, 0, 25, &[TIMEOUT_PENALTY - 20; 25]);
        assert_eq!(
            processor.process(&mut pool, handle),
            Output::Point(Point {
                azimuth: 0,
                distance: MAX_DISTANCE
            })
        );
    }
}
