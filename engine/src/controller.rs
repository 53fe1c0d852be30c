use core::fmt::{Display, Formatter};

use num::clamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ControllerConfig {
    pub kp: i32,
    pub ki: i32,
    /// Sampling time in ticks. Multiplies the integral gain.
    pub ta: i32,
    /// Output limit, usually the PWM period.
    pub max_power: i32,
    /// Encoder counts per revolution, the position counter wraps there.
    pub counts_per_turn: u16,
    /// Saturated ticks before the motor counts as stalled.
    pub stall_ticks: u32,
}

impl ControllerConfig {
    /// Stall threshold for a motor expected to reach speed within `rise_time_ms`.
    pub fn stall_ticks_for(rise_time_ms: u32, tick_ms: u32) -> u32 {
        if tick_ms == 0 {
            return rise_time_ms;
        }
        (rise_time_ms / tick_ms).max(1)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: 100,
            ki: 20,
            ta: 1,
            max_power: 4200,
            counts_per_turn: 2000,
            stall_ticks: 200,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControllerState {
    Stopped,
    Running,
}

impl Display for ControllerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.pad(match *self {
            ControllerState::Stopped => "stopped",
            ControllerState::Running => "running",
        })
    }
}

/// What to do with the motor after a controller tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tick {
    /// Controller is stopped, motor stays disabled.
    Idle,
    /// Setpoint went to zero, disable the motor.
    Stop,
    /// Apply signed drive power. `stalled` is set once, on the tick the
    /// stall threshold runs out.
    Drive { power: i32, stalled: bool },
}

/// PI speed loop with anti-windup and stall detection.
///
/// Speed is measured in encoder counts per tick.
pub struct SpeedController {
    config: ControllerConfig,
    state: ControllerState,
    setpoint: i32,
    error_sum: i32,
    last_position: Option<u16>,
    power: i32,
    saturated: bool,
    stall_countdown: u32,
    stall_reported: bool,
}

impl SpeedController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            state: ControllerState::Stopped,
            setpoint: 0,
            error_sum: 0,
            last_position: None,
            power: 0,
            saturated: false,
            stall_countdown: config.stall_ticks,
            stall_reported: false,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn setpoint(&self) -> i32 {
        self.setpoint
    }

    pub fn power(&self) -> i32 {
        self.power
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn error_sum(&self) -> i32 {
        self.error_sum
    }

    /// Non-zero setpoint starts the loop at once. Zero setpoint stops it on
    /// the next tick.
    pub fn set_setpoint(&mut self, setpoint: i32) {
        self.setpoint = setpoint;

        if setpoint != 0 && self.state == ControllerState::Stopped {
            self.reset();
            self.state = ControllerState::Running;
        }
    }

    /// Runs one control step with the current encoder position.
    pub fn update(&mut self, position: u16) -> Tick {
        if self.state == ControllerState::Stopped {
            return Tick::Idle;
        }

        if self.setpoint == 0 {
            self.state = ControllerState::Stopped;
            self.reset();
            return Tick::Stop;
        }

        let velocity = self.velocity(position);
        let error = self.setpoint - velocity;

        self.error_sum += error;

        let config = &self.config;
        let unclamped = config.kp * error + config.ki * config.ta * self.error_sum;
        let power = clamp(unclamped, -config.max_power, config.max_power);

        self.saturated = power != unclamped;
        let mut stalled = false;

        if self.saturated {
            // Don't integrate while the output can't follow.
            self.error_sum -= error;

            self.stall_countdown = self.stall_countdown.saturating_sub(1);
            if self.stall_countdown == 0 && !self.stall_reported {
                self.stall_reported = true;
                stalled = true;
            }
        } else {
            self.stall_countdown = self.config.stall_ticks;
            self.stall_reported = false;
        }

        self.power = power;

        Tick::Drive { power, stalled }
    }

    // Position delta since the last tick, unwrapped across the counter rollover.
    fn velocity(&mut self, position: u16) -> i32 {
        let last = self.last_position.replace(position);

        let counts = self.config.counts_per_turn as i32;
        let half = counts / 2;

        match last {
            None => 0,
            Some(last) => {
                let mut delta = position as i32 - last as i32;
                if delta > half {
                    delta -= counts;
                } else if delta < -half {
                    delta += counts;
                }
                delta
            }
        }
    }

    fn reset(&mut self) {
        self.error_sum = 0;
        self.last_position = None;
        self.power = 0;
        self.saturated = false;
        self.stall_countdown = self.config.stall_ticks;
        self.stall_reported = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ControllerConfig {
        ControllerConfig {
            stall_ticks: 5,
            ..ControllerConfig::default()
        }
    }

    #[test]
    fn test_stopped_is_idle() {
        let mut controller = SpeedController::new(config());

        assert_eq!(controller.update(0), Tick::Idle);
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[test]
    fn test_start_and_stop() {
        let mut controller = SpeedController::new(config());

        controller.set_setpoint(10);
        assert_eq!(controller.state(), ControllerState::Running);

        // First tick has no previous position, speed reads as zero.
        assert_eq!(
            controller.update(0),
            Tick::Drive {
                power: 100 * 10 + 20 * 10,
                stalled: false
            }
        );

        controller.set_setpoint(0);
        assert_eq!(controller.update(10), Tick::Stop);
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert_eq!(controller.update(20), Tick::Idle);
    }

    #[test]
    fn test_at_setpoint_integral_holds() {
        let mut controller = SpeedController::new(config());
        controller.set_setpoint(10);

        controller.update(0);
        let sum = controller.error_sum();

        for i in 1..20u16 {
            let tick = controller.update(i * 10);
            assert_eq!(
                tick,
                Tick::Drive {
                    power: 20 * sum,
                    stalled: false
                }
            );
        }
        assert_eq!(controller.error_sum(), sum);
    }

    #[test]
    fn test_wraparound() {
        let mut controller = SpeedController::new(config());
        controller.set_setpoint(10);

        controller.update(1995);
        controller.update(5);
        // 1995 -> 5 is +10 counts, not -1990
        assert_eq!(controller.error_sum(), 10);

        controller.set_setpoint(-10);
        controller.update(1995);
        assert_eq!(controller.error_sum(), 10);
    }

    #[test]
    fn test_negative_saturation() {
        let mut controller = SpeedController::new(config());
        controller.set_setpoint(-100);

        assert_eq!(
            controller.update(0),
            Tick::Drive {
                power: -4200,
                stalled: false
            }
        );
        assert!(controller.is_saturated());
        assert_eq!(controller.error_sum(), 0);
    }

    #[test]
    fn test_anti_windup_and_stall() {
        let mut controller = SpeedController::new(config());
        controller.set_setpoint(50);

        // Locked rotor: position never changes.
        let mut stalls = 0;
        for _ in 0..100 {
            if let Tick::Drive { power, stalled } = controller.update(700) {
                assert_eq!(power, 4200);
                if stalled {
                    stalls += 1;
                }
            } else {
                panic!("controller stopped");
            }
            assert!(controller.error_sum().abs() <= 50);
        }
        assert_eq!(stalls, 1);

        // Rotor frees up, output leaves saturation and the latch clears.
        let tick = controller.update(750);
        assert_eq!(
            tick,
            Tick::Drive {
                power: 0,
                stalled: false
            }
        );
        assert!(!controller.is_saturated());

        // Stalls again, reported again after the full threshold.
        let mut ticks_to_stall = 0;
        loop {
            ticks_to_stall += 1;
            if let Tick::Drive { stalled: true, .. } = controller.update(750) {
                break;
            }
            assert!(ticks_to_stall < 100);
        }
        assert_eq!(ticks_to_stall, 5);
    }

    #[test]
    fn test_stall_ticks_for() {
        assert_eq!(ControllerConfig::stall_ticks_for(2000, 10), 200);
        assert_eq!(ControllerConfig::stall_ticks_for(5, 10), 1);
        assert_eq!(ControllerConfig::stall_ticks_for(100, 0), 100);
    }
}
