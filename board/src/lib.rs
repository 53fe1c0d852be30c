#![no_std]
#![deny(unsafe_code)]

use stm32f1xx_hal::gpio::{Alternate, Floating, Input, Output, PullUp, PushPull};
use stm32f1xx_hal::gpio::{PA0, PA1, PA2, PA3, PA6, PA8, PA9};
use stm32f1xx_hal::gpio::{PB0, PB1, PB10, PB11, PB12, PB13, PB14, PB15, PB4, PB5};
use stm32f1xx_hal::pac;
use stm32f1xx_hal::serial::Tx;
use stm32f1xx_hal::spi::{Spi, Spi2NoRemap};
use stm32f1xx_hal::timer::{CounterHz, PwmChannel};

pub type SpiCs = PB12<Output<PushPull>>;
pub type SpiClk = PB13<Alternate<PushPull>>;
pub type SpiMiso = PB14<Input<Floating>>;
pub type SpiMosi = PB15<Alternate<PushPull>>;
pub type SpiBus = Spi<pac::SPI2, Spi2NoRemap, (SpiClk, SpiMiso, SpiMosi), u8>;

/// TDC-GP22 interrupt output, active low.
pub type TdcInterrupt = PB1<Input<PullUp>>;

pub type EncoderA = PA8<Input<Floating>>;
pub type EncoderB = PA9<Input<Floating>>;
/// Once per revolution, active low.
pub type EncoderIndex = PB0<Input<PullUp>>;

pub type LaserPin = PA0<Alternate<PushPull>>;
pub type LaserPwm = PwmChannel<pac::TIM2, 0>;
/// Counts laser pulses, runs at the pulse rate.
pub type PulseCounter = CounterHz<pac::TIM4>;
pub type LaserAlert = PA1<Input<PullUp>>;

pub type MotorPwmPin = PA6<Alternate<PushPull>>;
pub type MotorPwm = PwmChannel<pac::TIM3, 0>;
pub type MotorIn1 = PB10<Output<PushPull>>;
pub type MotorIn2 = PB11<Output<PushPull>>;
pub type MotorStandby = PB5<Output<PushPull>>;
pub type MotorAlert = PB4<Input<PullUp>>;

pub type SerialTxPin = PA2<Alternate<PushPull>>;
pub type SerialRxPin = PA3<Input<Floating>>;
pub type SerialTx = Tx<pac::USART2>;
