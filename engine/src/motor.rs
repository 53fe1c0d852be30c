use core::fmt::{Display, Formatter};

use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::PwmPin;
use num::integer::Integer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Error<E> {
    Pin(E),
}

impl<E> From<E> for Error<E> {
    fn from(pin_error: E) -> Self {
        Error::Pin(pin_error)
    }
}

impl<E: Display> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Pin(error) => write!(f, "motor pin error: {}", error),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.pad(match *self {
            Direction::Clockwise => "cw",
            Direction::CounterClockwise => "ccw",
        })
    }
}

/// H-bridge driver with two direction inputs, an active low standby input
/// and an active low alert output.
pub struct Motor<PWM: PwmPin, IN1, IN2, STBY, ALERT> {
    pwm: PWM,
    in1: IN1,
    in2: IN2,
    standby: STBY,
    alert: ALERT,
    // Full scale of drive() input.
    max_power: u32,
    direction: Option<Direction>,
    enabled: bool,
}

impl<PWM, IN1, IN2, STBY, ALERT, E> Motor<PWM, IN1, IN2, STBY, ALERT>
where
    PWM: PwmPin<Duty = u16>,
    IN1: OutputPin<Error = E>,
    IN2: OutputPin<Error = E>,
    STBY: OutputPin<Error = E>,
    ALERT: InputPin<Error = E>,
{
    /// Motor starts in standby.
    pub fn new(
        mut pwm: PWM,
        in1: IN1,
        in2: IN2,
        mut standby: STBY,
        alert: ALERT,
        max_power: u32,
    ) -> Result<Self, Error<E>> {
        pwm.set_duty(0);
        pwm.disable();
        standby.set_low()?;

        Ok(Self {
            pwm,
            in1,
            in2,
            standby,
            alert,
            max_power: max_power.max(1),
            direction: None,
            enabled: false,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn enable(&mut self) -> Result<(), Error<E>> {
        if !self.enabled {
            self.standby.set_high()?;
            self.pwm.enable();
            self.enabled = true;
        }

        Ok(())
    }

    pub fn disable(&mut self) -> Result<(), Error<E>> {
        self.pwm.set_duty(0);
        self.pwm.disable();
        self.standby.set_low()?;
        self.enabled = false;

        Ok(())
    }

    /// Sign selects direction, magnitude is scaled from max_power to the
    /// PWM range. Direction pins only change when the sign changes.
    pub fn drive(&mut self, power: i32) -> Result<(), Error<E>> {
        let direction = if power < 0 {
            Direction::CounterClockwise
        } else {
            Direction::Clockwise
        };

        if self.direction != Some(direction) {
            // Brake while switching so the bridge never sees both inputs high.
            self.pwm.set_duty(0);
            match direction {
                Direction::Clockwise => {
                    self.in2.set_low()?;
                    self.in1.set_high()?;
                }
                Direction::CounterClockwise => {
                    self.in1.set_low()?;
                    self.in2.set_high()?;
                }
            }
            self.direction = Some(direction);
        }

        self.pwm.set_duty(self.scale_duty(power.unsigned_abs()));

        Ok(())
    }

    /// Overcurrent or thermal shutdown reported by the driver.
    pub fn alert(&self) -> Result<bool, Error<E>> {
        Ok(self.alert.is_low()?)
    }

    pub fn release(self) -> (PWM, IN1, IN2, STBY, ALERT) {
        (self.pwm, self.in1, self.in2, self.standby, self.alert)
    }

    fn scale_duty(&self, magnitude: u32) -> u16 {
        let max_duty = self.pwm.get_max_duty() as u32;
        let magnitude = magnitude.min(self.max_power);

        // Round to nearest.
        let (duty, rem) = (magnitude as u64 * max_duty as u64).div_rem(&(self.max_power as u64));
        let duty = if rem * 2 >= self.max_power as u64 {
            duty + 1
        } else {
            duty
        };

        duty.min(max_duty as u64) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    struct TestPwmPin {
        duty: u16,
        max_duty: u16,
        enabled: bool,
    }

    impl PwmPin for TestPwmPin {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled = false;
        }
        fn enable(&mut self) {
            self.enabled = true;
        }
        fn get_duty(&self) -> Self::Duty {
            self.duty
        }
        fn get_max_duty(&self) -> Self::Duty {
            self.max_duty
        }
        fn set_duty(&mut self, duty: Self::Duty) {
            self.duty = duty
        }
    }

    // Pin state shared with the test so it can be inspected after the motor takes ownership.
    #[derive(Clone, Default)]
    struct TestPin(Rc<RefCell<bool>>);

    impl TestPin {
        fn is_set(&self) -> bool {
            *self.0.borrow()
        }
    }

    impl OutputPin for TestPin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            *self.0.borrow_mut() = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            *self.0.borrow_mut() = true;
            Ok(())
        }
    }

    impl InputPin for TestPin {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Self::Error> {
            Ok(*self.0.borrow())
        }

        fn is_low(&self) -> Result<bool, Self::Error> {
            Ok(!*self.0.borrow())
        }
    }

    struct Pins {
        in1: TestPin,
        in2: TestPin,
        standby: TestPin,
        alert: TestPin,
    }

    type TestMotor = Motor<TestPwmPin, TestPin, TestPin, TestPin, TestPin>;

    fn make_motor() -> (TestMotor, Pins) {
        let pins = Pins {
            in1: TestPin::default(),
            in2: TestPin::default(),
            standby: TestPin(Rc::new(RefCell::new(true))),
            alert: TestPin(Rc::new(RefCell::new(true))),
        };
        let pwm = TestPwmPin {
            duty: 100,
            max_duty: 4201,
            enabled: true,
        };

        let motor = Motor::new(
            pwm,
            pins.in1.clone(),
            pins.in2.clone(),
            pins.standby.clone(),
            pins.alert.clone(),
            4200,
        )
        .unwrap();

        (motor, pins)
    }

    #[test]
    fn test_starts_in_standby() {
        let (motor, pins) = make_motor();

        assert!(!motor.is_enabled());
        assert!(!pins.standby.is_set());

        let (pwm, ..) = motor.release();
        assert_eq!(pwm.duty, 0);
        assert!(!pwm.enabled);
    }

    #[test]
    fn test_drive_directions() {
        let (mut motor, pins) = make_motor();

        motor.enable().unwrap();
        assert!(pins.standby.is_set());

        motor.drive(2100).unwrap();
        assert_eq!(motor.direction(), Some(Direction::Clockwise));
        assert!(pins.in1.is_set());
        assert!(!pins.in2.is_set());

        motor.drive(-4200).unwrap();
        assert_eq!(motor.direction(), Some(Direction::CounterClockwise));
        assert!(!pins.in1.is_set());
        assert!(pins.in2.is_set());

        let (pwm, ..) = motor.release();
        assert_eq!(pwm.duty, 4201);
        assert!(pwm.enabled);
    }

    #[test]
    fn test_duty_scaling() {
        let (mut motor, _pins) = make_motor();

        motor.drive(2100).unwrap();
        let (pwm, ..) = motor.release();
        // 2100 * 4201 / 4200 = 2100.5, rounded up
        assert_eq!(pwm.duty, 2101);

        let (mut motor, _pins) = make_motor();
        motor.drive(100_000).unwrap();
        let (pwm, ..) = motor.release();
        assert_eq!(pwm.duty, 4201);
    }

    #[test]
    fn test_disable() {
        let (mut motor, pins) = make_motor();

        motor.enable().unwrap();
        motor.drive(1000).unwrap();
        motor.disable().unwrap();

        assert!(!motor.is_enabled());
        assert!(!pins.standby.is_set());
        let (pwm, ..) = motor.release();
        assert_eq!(pwm.duty, 0);
    }

    #[test]
    fn test_alert() {
        let (motor, pins) = make_motor();

        assert_eq!(motor.alert(), Ok(false));
        *pins.alert.0.borrow_mut() = false;
        assert_eq!(motor.alert(), Ok(true));
    }
}
