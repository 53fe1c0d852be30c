//! Hardware seams of the acquisition.

use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;
use gp22::{Gp22, Status, StatusClass};

use crate::angle::Increment;

/// Quadrature encoder with a single-shot position compare.
pub trait Encoder {
    fn position(&self) -> Increment;
    /// Raises the capture event once when the position reaches `target`.
    fn arm_capture(&mut self, target: Increment);
    fn disarm(&mut self);
    /// Resets the counter to zero, called on the index pulse.
    fn zero(&mut self);
}

/// Laser fire sequencer.
pub trait PulseGenerator {
    /// Fires `pulses` laser pulses, then raises the burst complete event.
    fn start_burst(&mut self, pulses: u32);
}

/// Time-to-digital converter.
pub trait RangingSensor {
    type Error;

    /// Arms the sensor for one time measurement.
    fn start_measurement(&mut self) -> Result<(), Self::Error>;
    fn read_status(&mut self) -> Result<u16, Self::Error>;
    fn read_result(&mut self) -> Result<u32, Self::Error>;
    fn classify(status: u16) -> StatusClass;

    fn suspend_auto_calibration(&mut self) -> Result<(), Self::Error>;
    fn start_resonator_calibration(&mut self) -> Result<(), Self::Error>;
    fn restore_configuration(&mut self) -> Result<(), Self::Error>;
}

impl<SPI, CS, SpiError, PinError> RangingSensor for Gp22<SPI, CS>
where
    SPI: Transfer<u8, Error = SpiError> + Write<u8, Error = SpiError>,
    CS: OutputPin<Error = PinError>,
{
    type Error = gp22::Error<SpiError, PinError>;

    fn start_measurement(&mut self) -> Result<(), Self::Error> {
        self.init()
    }

    fn read_status(&mut self) -> Result<u16, Self::Error> {
        Gp22::read_status(self).map(|status| status.0)
    }

    fn read_result(&mut self) -> Result<u32, Self::Error> {
        Gp22::read_result(self)
    }

    fn classify(status: u16) -> StatusClass {
        Status(status).classify()
    }

    fn suspend_auto_calibration(&mut self) -> Result<(), Self::Error> {
        Gp22::suspend_auto_calibration(self)
    }

    fn start_resonator_calibration(&mut self) -> Result<(), Self::Error> {
        self.start_cal_resonator()
    }

    fn restore_configuration(&mut self) -> Result<(), Self::Error> {
        Gp22::restore_configuration(self)
    }
}
