use crate::acquisition;
use crate::error::Error;
use crate::event_queue::{Event, EventQueue};
use crate::state::StaticState;
use crate::system_time::Duration;

use board::{LaserAlert, MotorAlert, MotorIn1, MotorIn2, MotorPwm, MotorStandby};
use engine::{ControllerConfig, Motor, SpeedController, Tick};
use rtt_target::rprintln;
use scanner::supervisor::SPEED_TICK_MS;
use scanner::Fault;

pub type EngineMotor = Motor<MotorPwm, MotorIn1, MotorIn2, MotorStandby, MotorAlert>;

const TICK: Duration = Duration::millis(SPEED_TICK_MS);
// Time the mirror gets to reach its speed before a stall is reported.
const RISE_TIME_MS: u32 = 2000;

struct State {
    controller: SpeedController,
    motor: EngineMotor,
    laser_alert: LaserAlert,
    // Alerts are reported on the falling edge only.
    motor_alerted: bool,
    laser_alerted: bool,
}

impl State {
    fn tick(&mut self) -> Result<(), Error> {
        self.check_alerts()?;

        let position = acquisition::position().ok_or(Error::Uninitialized)?;
        match self.controller.update(position) {
            Tick::Idle => {}
            Tick::Stop => {
                rprintln!("engine stopped");
                self.motor.disable()?;
            }
            Tick::Drive { power, stalled } => {
                self.motor.enable()?;
                self.motor.drive(power)?;

                if stalled {
                    acquisition::report(Fault::EngineStalled);
                }
            }
        }

        Ok(())
    }

    fn check_alerts(&mut self) -> Result<(), Error> {
        let motor_alert = self.motor.alert()?;
        if motor_alert && !self.motor_alerted {
            acquisition::report(Fault::EngineDriver);
        }
        self.motor_alerted = motor_alert;

        let laser_alert = self.laser_alert.is_low();
        if laser_alert && !self.laser_alerted {
            acquisition::report(Fault::LaserDriver);
        }
        self.laser_alerted = laser_alert;

        Ok(())
    }
}

static STATE: StaticState<State> = StaticState::new();

static SPEED_TICK: Event = Event::new(&|| STATE.with(|state| state.tick()).unwrap());

pub fn start(
    event_queue: &mut EventQueue<'_, 'static, 'static>,
    motor: EngineMotor,
    laser_alert: LaserAlert,
) {
    let config = ControllerConfig {
        stall_ticks: ControllerConfig::stall_ticks_for(RISE_TIME_MS, SPEED_TICK_MS),
        ..ControllerConfig::default()
    };

    STATE.set(State {
        controller: SpeedController::new(config),
        motor,
        laser_alert,
        motor_alerted: false,
        laser_alerted: false,
    });

    event_queue.bind(&SPEED_TICK);
    SPEED_TICK.period(TICK);
    SPEED_TICK.call();
}

/// Takes effect on the next tick.
pub fn set_setpoint(setpoint: i32) -> Result<(), Error> {
    STATE.with(|state| {
        state.controller.set_setpoint(setpoint);
        Ok(())
    })
}
