#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod registers;

use core::fmt::{self, Debug, Display, Formatter};

use crate::registers::*;
use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;

/// Reference resonator frequency in Hz.
pub const RESONATOR_FREQ: u32 = 32_768;
/// Resonator periods measured by one calibration.
pub const RESONATOR_CYCLES: u32 = 2;
/// High speed crystal frequency in Hz.
pub const HS_CRYSTAL_FREQ: u32 = 4_000_000;

/// Status word value of a measurement with one hit on each channel.
pub const STATUS_SINGLE_HIT: u16 = 0x48;

/// The error type used by this driver.
///
/// Wraps an SPI bus or chip select error, and adds its own protocol errors
/// on top of that.
pub enum Error<SpiError, PinError> {
    /// An SPI transfer failed.
    Spi(SpiError),

    /// Chip select could not be set.
    Pin(PinError),

    /// Register 1 readback doesn't match the written configuration.
    ///
    /// Usually means the chip is not powered or not connected.
    CommunicationCheck(u8),
}

impl<SpiError, PinError> Debug for Error<SpiError, PinError>
where
    SpiError: Debug,
    PinError: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi) => write!(f, "Error::Spi({:?})", spi),
            Error::Pin(pin) => write!(f, "Error::Pin({:?})", pin),
            Error::CommunicationCheck(value) => write!(f, "Error::CommunicationCheck({:#x})", value),
        }
    }
}

impl<SpiError, PinError> Display for Error<SpiError, PinError>
where
    SpiError: Display,
    PinError: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi) => write!(f, "SPI error: {}", spi),
            Error::Pin(pin) => write!(f, "chip select error: {}", pin),
            Error::CommunicationCheck(value) => {
                write!(f, "unexpected register 1 readback {:#x}", value)
            }
        }
    }
}

impl<SpiError, PinError> Clone for Error<SpiError, PinError>
where
    SpiError: Clone,
    PinError: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Error::Spi(spi) => Error::Spi(spi.clone()),
            Error::Pin(pin) => Error::Pin(pin.clone()),
            Error::CommunicationCheck(value) => Error::CommunicationCheck(*value),
        }
    }
}

impl<SpiError, PinError> PartialEq for Error<SpiError, PinError>
where
    SpiError: PartialEq,
    PinError: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::Spi(a), Error::Spi(b)) => a == b,
            (Error::Pin(a), Error::Pin(b)) => a == b,
            (Error::CommunicationCheck(a), Error::CommunicationCheck(b)) => a == b,
            _ => false,
        }
    }
}

/// Register 0 to 6 contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    pub registers: [u32; NUM_CONFIG_REGISTERS],
}

impl Default for Config {
    // Measurement range 1, single hit on both channels, auto calibration
    // and fast init enabled, fire pulse generator drives the laser.
    fn default() -> Self {
        Self {
            registers: [
                0x0004_2655,
                0x19c9_00aa,
                0x2000_0000,
                0x0000_00ff,
                0x2000_0000,
                0x1000_0000,
                0x0000_0000,
            ],
        }
    }
}

/// How a status word affects the measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusClass {
    /// Measurement completed.
    Ok,
    /// No stop pulse before the TDC timeout. Nothing reflected the beam.
    NoReflection,
    /// Hardware reported an error condition.
    Malfunction,
}

impl Display for StatusClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(match *self {
            StatusClass::Ok => "ok",
            StatusClass::NoReflection => "no reflection",
            StatusClass::Malfunction => "malfunction",
        })
    }
}

/// Raw status register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Status(pub u16);

impl Status {
    /// Result register the next result goes to.
    pub fn alu_pointer(&self) -> u8 {
        (self.0 & STAT_ALU_POINTER_MASK) as u8
    }

    pub fn hits_ch1(&self) -> u8 {
        ((self.0 >> STAT_HITS_CH1_SHIFT) & STAT_HITS_MASK) as u8
    }

    pub fn hits_ch2(&self) -> u8 {
        ((self.0 >> STAT_HITS_CH2_SHIFT) & STAT_HITS_MASK) as u8
    }

    pub fn tdc_timeout(&self) -> bool {
        self.0 & STAT_TIMEOUT_TDC != 0
    }

    pub fn precounter_timeout(&self) -> bool {
        self.0 & STAT_TIMEOUT_PRECOUNTER != 0
    }

    /// Temperature sensor open or shorted.
    pub fn sensor_error(&self) -> bool {
        self.0 & (STAT_ERROR_OPEN | STAT_ERROR_SHORT) != 0
    }

    pub fn eeprom_error(&self) -> bool {
        self.0 & (STAT_EEPROM_ERROR_SINGLE | STAT_EEPROM_ERROR_DOUBLE) != 0
    }

    pub fn eeprom_matches_config(&self) -> bool {
        self.0 & STAT_EEPROM_EQ_CREG != 0
    }

    /// A valid result needs exactly one hit on each channel.
    pub fn classify(&self) -> StatusClass {
        if self.sensor_error() || self.eeprom_error() || self.precounter_timeout() {
            StatusClass::Malfunction
        } else if self.tdc_timeout() {
            StatusClass::NoReflection
        } else if self.hits_ch1() != 1 || self.hits_ch2() != 1 {
            StatusClass::Malfunction
        } else {
            StatusClass::Ok
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status({:#06x}: {}, hits {}/{})",
            self.0,
            self.classify(),
            self.hits_ch1(),
            self.hits_ch2()
        )
    }
}

pub struct Gp22<SPI, CS> {
    spi: SPI,
    cs: CS,
    config: Config,
}

impl<SPI, CS, SpiError, PinError> Gp22<SPI, CS>
where
    SPI: Transfer<u8, Error = SpiError> + Write<u8, Error = SpiError>,
    CS: OutputPin<Error = PinError>,
{
    pub fn new(spi: SPI, cs: CS, config: Config) -> Self {
        Self { spi, cs, config }
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resets the chip and writes all configuration registers.
    pub fn configure(&mut self) -> Result<(), Error<SpiError, PinError>> {
        self.opcode(POWER_ON_RESET)?;

        for reg in 0..NUM_CONFIG_REGISTERS {
            self.write_register(reg as u8, self.config.registers[reg])?;
        }

        Ok(())
    }

    /// Reads back the top byte of register 1 and compares it with the
    /// configured value.
    pub fn check_communication(&mut self) -> Result<(), Error<SpiError, PinError>> {
        let mut buffer = [READ_REG1, 0];
        self.transfer(&mut buffer)?;

        let expected = (self.config.registers[1] >> 24) as u8;
        if buffer[1] != expected {
            return Err(Error::CommunicationCheck(buffer[1]));
        }

        Ok(())
    }

    /// Arms the TDC for the next time measurement.
    pub fn init(&mut self) -> Result<(), Error<SpiError, PinError>> {
        self.opcode(INIT)
    }

    /// Starts a single time-of-flight sequence from the fire generator.
    pub fn start_tof(&mut self) -> Result<(), Error<SpiError, PinError>> {
        self.opcode(START_TOF)
    }

    /// Arms the TDC and starts measuring the reference resonator against
    /// the high speed clock. Result is in result register 0 as 16.16 fixed
    /// point count of high speed clock periods.
    pub fn start_cal_resonator(&mut self) -> Result<(), Error<SpiError, PinError>> {
        self.opcode(INIT)?;
        self.opcode(START_CAL_RESONATOR)
    }

    pub fn start_cal_tdc(&mut self) -> Result<(), Error<SpiError, PinError>> {
        self.opcode(START_CAL_TDC)
    }

    pub fn read_status(&mut self) -> Result<Status, Error<SpiError, PinError>> {
        let mut buffer = [READ_STAT, 0, 0];
        self.transfer(&mut buffer)?;

        Ok(Status(u16::from_be_bytes([buffer[1], buffer[2]])))
    }

    /// Reads result register 0 to 3.
    pub fn read_result_register(&mut self, index: u8) -> Result<u32, Error<SpiError, PinError>> {
        let mut buffer = [READ_RES | (index % NUM_RESULT_REGISTERS), 0, 0, 0, 0];
        self.transfer(&mut buffer)?;

        Ok(u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]))
    }

    /// Reads the first result register.
    pub fn read_result(&mut self) -> Result<u32, Error<SpiError, PinError>> {
        self.read_result_register(0)
    }

    /// Disables automatic calibration and fast init for the duration of a
    /// resonator calibration. Registers already in that state are not
    /// written.
    pub fn suspend_auto_calibration(&mut self) -> Result<(), Error<SpiError, PinError>> {
        let reg0 = self.config.registers[0];
        if reg0 & REG0_CALIBRATE != 0 {
            self.write_register(0, reg0 & !REG0_CALIBRATE)?;
        }

        let reg1 = self.config.registers[1];
        if reg1 & REG1_EN_FAST_INIT != 0 {
            self.write_register(1, reg1 & !REG1_EN_FAST_INIT)?;
        }

        Ok(())
    }

    /// Restores registers touched by suspend_auto_calibration().
    pub fn restore_configuration(&mut self) -> Result<(), Error<SpiError, PinError>> {
        let reg0 = self.config.registers[0];
        if reg0 & REG0_CALIBRATE != 0 {
            self.write_register(0, reg0)?;
        }

        let reg1 = self.config.registers[1];
        if reg1 & REG1_EN_FAST_INIT != 0 {
            self.write_register(1, reg1)?;
        }

        Ok(())
    }

    // Register value goes MSB first.
    fn write_register(&mut self, reg: u8, value: u32) -> Result<(), Error<SpiError, PinError>> {
        let bytes = value.to_be_bytes();
        let command = [WRITE_REG | reg, bytes[0], bytes[1], bytes[2], bytes[3]];

        self.write(&command)
    }

    fn opcode(&mut self, opcode: Opcode) -> Result<(), Error<SpiError, PinError>> {
        self.write(&[opcode])
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error<SpiError, PinError>> {
        self.cs.set_low().map_err(Error::Pin)?;
        let result = self.spi.write(bytes).map_err(Error::Spi);
        // Release the bus even if the write failed.
        self.cs.set_high().map_err(Error::Pin)?;

        result
    }

    fn transfer(&mut self, buffer: &mut [u8]) -> Result<(), Error<SpiError, PinError>> {
        self.cs.set_low().map_err(Error::Pin)?;
        let result = self.spi.transfer(buffer).map(|_| ()).map_err(Error::Spi);
        self.cs.set_high().map_err(Error::Pin)?;

        result
    }
}
