#![deny(unsafe_code)]

use crate::error::Error;

use board::{LaserPwm, PulseCounter};
use scanner::angle::Increment;
use scanner::hw::{Encoder, PulseGenerator};
use stm32f1xx_hal::pac::TIM1;
use stm32f1xx_hal::prelude::*;
use stm32f1xx_hal::time::Hertz;
use stm32f1xx_hal::timer::Event;

pub const PULSE_FREQ: Hertz = Hertz::kHz(12);
// Pulse width as a fraction of the period.
const PULSE_DUTY_DIVISOR: u16 = 20;

/// TIM1 in encoder mode. Channel 3 compare raises the capture interrupt,
/// channels 1 and 2 belong to the quadrature inputs.
pub struct QuadratureEncoder {
    tim: TIM1,
}

impl QuadratureEncoder {
    // Timer must already count in encoder mode with the reload at one turn.
    pub fn new(tim: TIM1) -> Self {
        tim.dier.modify(|_, w| w.cc3ie().clear_bit());
        QuadratureEncoder { tim }
    }

    // Returns true if the compare fired since the last call.
    pub fn clear_capture(&mut self) -> bool {
        let pending = self.tim.sr.read().cc3if().bit_is_set();
        self.tim.sr.modify(|_, w| w.cc3if().clear_bit());
        pending
    }
}

impl Encoder for QuadratureEncoder {
    fn position(&self) -> Increment {
        self.tim.cnt.read().cnt().bits()
    }

    fn arm_capture(&mut self, target: Increment) {
        self.tim.ccr3.write(|w| w.ccr().bits(target));
        self.tim.sr.modify(|_, w| w.cc3if().clear_bit());
        self.tim.dier.modify(|_, w| w.cc3ie().set_bit());
    }

    fn disarm(&mut self) {
        self.tim.dier.modify(|_, w| w.cc3ie().clear_bit());
    }

    fn zero(&mut self) {
        self.tim.cnt.write(|w| w.cnt().bits(0));
    }
}

/// Laser driven by TIM2 PWM, pulses counted with TIM4 running at the
/// same rate.
pub struct LaserPulser {
    pwm: LaserPwm,
    counter: PulseCounter,
    remaining: u32,
}

impl LaserPulser {
    pub fn new(mut pwm: LaserPwm, mut counter: PulseCounter) -> Result<Self, Error> {
        pwm.set_duty(pwm.get_max_duty() / PULSE_DUTY_DIVISOR);
        pwm.disable();
        counter.start(PULSE_FREQ)?;

        Ok(LaserPulser {
            pwm,
            counter,
            remaining: 0,
        })
    }

    // Called from the counter interrupt. Returns true once, after the last
    // pulse of a burst.
    pub fn on_pulse(&mut self) -> bool {
        self.counter.clear_interrupt(Event::Update);

        if self.remaining == 0 {
            return false;
        }

        self.remaining -= 1;
        if self.remaining > 0 {
            return false;
        }

        self.pwm.disable();
        self.counter.unlisten(Event::Update);
        true
    }
}

impl PulseGenerator for LaserPulser {
    fn start_burst(&mut self, pulses: u32) {
        self.remaining = pulses;
        self.counter.clear_interrupt(Event::Update);
        self.counter.listen(Event::Update);
        self.pwm.enable();
    }
}
