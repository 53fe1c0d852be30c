use core::fmt::{Display, Formatter};

use crate::angle::{self, Increment, TenthDegree, INC_PER_TURN};
use crate::record::MAX_RAWDATA_LENGTH;

pub const DEFAULT_LEFT: TenthDegree = -1188;
pub const DEFAULT_RIGHT: TenthDegree = 1188;
pub const DEFAULT_STEP: TenthDegree = 18;
pub const DEFAULT_PULSES: u8 = 25;
/// Mirror revolutions per second.
pub const DEFAULT_SCAN_RATE: u8 = 2;
pub const MAX_SCAN_RATE: u8 = 10;

/// Azimuth of the known-distance target used for propagation delay calibration.
pub const REFERENCE_AZIMUTH: TenthDegree = -1798;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigError {
    /// Scan area is empty, overlaps the calibration target or leaves no
    /// room for the resonator calibration before the end of the turn.
    InvalidBoundary,
    InvalidStep,
    InvalidPulses,
    InvalidScanRate,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.pad(match *self {
            ConfigError::InvalidBoundary => "invalid scan boundary",
            ConfigError::InvalidStep => "invalid scan step",
            ConfigError::InvalidPulses => "invalid number of pulses",
            ConfigError::InvalidScanRate => "invalid scan rate",
        })
    }
}

/// User-facing scan settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScanConfig {
    pub left: TenthDegree,
    pub right: TenthDegree,
    pub step: TenthDegree,
    pub pulses: u8,
    pub scan_rate: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            left: DEFAULT_LEFT,
            right: DEFAULT_RIGHT,
            step: DEFAULT_STEP,
            pulses: DEFAULT_PULSES,
            scan_rate: DEFAULT_SCAN_RATE,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.plan().map(|_| ())
    }

    pub fn with_boundary(self, left: TenthDegree, right: TenthDegree) -> Result<Self, ConfigError> {
        let config = Self { left, right, ..self };
        config.validate()?;
        Ok(config)
    }

    pub fn with_step(self, step: TenthDegree) -> Result<Self, ConfigError> {
        let config = Self { step, ..self };
        config.validate()?;
        Ok(config)
    }

    pub fn with_pulses(self, pulses: u8) -> Result<Self, ConfigError> {
        let config = Self { pulses, ..self };
        config.validate()?;
        Ok(config)
    }

    pub fn with_scan_rate(self, scan_rate: u8) -> Result<Self, ConfigError> {
        let config = Self { scan_rate, ..self };
        config.validate()?;
        Ok(config)
    }

    /// Converts the settings to encoder positions. Fails if the settings
    /// are out of range.
    pub fn plan(&self) -> Result<ScanPlan, ConfigError> {
        if self.pulses == 0 || self.pulses as usize > MAX_RAWDATA_LENGTH {
            return Err(ConfigError::InvalidPulses);
        }

        if self.scan_rate == 0 || self.scan_rate > MAX_SCAN_RATE {
            return Err(ConfigError::InvalidScanRate);
        }

        if self.step <= 0 {
            return Err(ConfigError::InvalidStep);
        }

        if self.left <= REFERENCE_AZIMUTH
            || self.left >= self.right
            || self.right > angle::MAX_AZIMUTH
        {
            return Err(ConfigError::InvalidBoundary);
        }

        let step = angle::delta_to_increments(self.step);
        let reference = angle::to_increments(REFERENCE_AZIMUTH);
        let left = angle::to_increments(self.left);
        let right = angle::to_increments(self.right);

        if left <= reference {
            return Err(ConfigError::InvalidBoundary);
        }

        // Resonator calibration runs two steps past the last point and
        // must not wrap into the next turn.
        let resonator = right as i32 + 2 * step;
        if resonator >= INC_PER_TURN as i32 {
            return Err(ConfigError::InvalidBoundary);
        }

        Ok(ScanPlan {
            left,
            right,
            step: step as Increment,
            pulses: self.pulses as u32,
            resonator: resonator as Increment,
            reference,
        })
    }
}

/// Scan settings in encoder increments, as used by the acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScanPlan {
    pub left: Increment,
    pub right: Increment,
    pub step: Increment,
    pub pulses: u32,
    /// Where the reference clock gets calibrated.
    pub resonator: Increment,
    /// Where the propagation delay gets calibrated.
    pub reference: Increment,
}

impl ScanPlan {
    /// Measurement points per revolution, excluding the reference point.
    pub fn num_points(&self) -> usize {
        ((self.right - self.left) / self.step) as usize + 1
    }
}

impl Default for ScanPlan {
    fn default() -> Self {
        // Defaults are always in range.
        match ScanConfig::default().plan() {
            Ok(plan) => plan,
            Err(_) => unreachable!(),
        }
    }
}
