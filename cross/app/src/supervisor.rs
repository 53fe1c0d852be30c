use crate::error::Error;
use crate::event_queue::{Event, EventQueue};
use crate::state::StaticState;
use crate::system_time::{self, Duration};
use crate::{acquisition, speed};

use rtt_target::rprintln;
use scanner::supervisor::{Directives, SPEED_TICK_MS};
use scanner::{Command, Directive, ScanConfig, Supervisor};

static STATE: StaticState<Supervisor> = StaticState::new();

pub static SUPERVISE: Event = Event::new(&|| supervise().unwrap());
static ENGINE_SLEEP: Event = Event::new(&|| engine_sleep().unwrap());

fn supervise() -> Result<(), Error> {
    while let Some(fault) = acquisition::take_fault() {
        rprintln!("fault {}", fault);
        let directives = STATE.with(|supervisor| Ok(supervisor.on_fault(fault)))?;
        apply(&directives)?;
    }

    let dropped = acquisition::take_dropped_faults();
    if dropped > 0 {
        rprintln!("{} faults dropped", dropped);
    }

    Ok(())
}

fn engine_sleep() -> Result<(), Error> {
    let directives = STATE.with(|supervisor| Ok(supervisor.engine_sleep_expired()))?;
    apply(&directives)
}

// Runs outside of STATE so directives may call back into other modules.
fn apply(directives: &Directives) -> Result<(), Error> {
    for directive in directives {
        match *directive {
            Directive::StartScan(plan) => {
                rprintln!("scan {}..{} step {}", plan.left, plan.right, plan.step);
                acquisition::start(plan);
            }
            Directive::StopScan => acquisition::stop(),
            Directive::SetSpeed(setpoint) => speed::set_setpoint(setpoint)?,
            Directive::ArmEngineSleep(ms) => {
                ENGINE_SLEEP.call_at(system_time::now() + Duration::millis(ms));
            }
            Directive::CancelEngineSleep => ENGINE_SLEEP.cancel(),
        }
    }

    Ok(())
}

pub fn start(event_queue: &mut EventQueue<'_, 'static, 'static>, config: ScanConfig) {
    STATE.set(Supervisor::new(config, SPEED_TICK_MS));
    event_queue.bind(&SUPERVISE);
    event_queue.bind(&ENGINE_SLEEP);
}

pub fn command(command: Command) -> Result<(), Error> {
    let directives = STATE.with(|supervisor| Ok(supervisor.command(command)?))?;
    apply(&directives)
}
