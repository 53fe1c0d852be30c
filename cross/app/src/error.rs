#![deny(unsafe_code)]

use core::convert::Infallible;

pub type SensorError = gp22::Error<stm32f1xx_hal::spi::Error, Infallible>;

#[derive(Debug)]
pub enum Error {
    Sensor(SensorError),
    Motor(engine::Error<Infallible>),
    Config(scanner::ConfigError),
    Serial,
    Timer(stm32f1xx_hal::timer::Error),
    Uninitialized,
}

impl From<SensorError> for Error {
    fn from(sensor_error: SensorError) -> Self {
        Error::Sensor(sensor_error)
    }
}

impl From<engine::Error<Infallible>> for Error {
    fn from(motor_error: engine::Error<Infallible>) -> Self {
        Error::Motor(motor_error)
    }
}

impl From<scanner::ConfigError> for Error {
    fn from(config_error: scanner::ConfigError) -> Self {
        Error::Config(config_error)
    }
}

impl From<stm32f1xx_hal::timer::Error> for Error {
    fn from(timer_error: stm32f1xx_hal::timer::Error) -> Self {
        Error::Timer(timer_error)
    }
}
