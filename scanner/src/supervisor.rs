//! Command/data mode machine.
//!
//! The supervisor owns the pending scan configuration and decides what the
//! firmware does on user commands, faults and the engine sleep timer. It
//! never touches hardware itself, it returns [`Directive`]s for the caller
//! to carry out in order.

use heapless::Vec;

use crate::angle::{TenthDegree, INC_PER_TURN};
use crate::config::{ConfigError, ScanConfig, ScanPlan};
use crate::fault::{Fault, Severity};

/// Speed controller tick used by the firmware, in milliseconds.
pub const SPEED_TICK_MS: u32 = 10;

/// Delay before the motor spins down after leaving data mode.
pub const DEFAULT_ENGINE_SLEEP_MS: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Command,
    Data,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    EnterData,
    EnterCommand,
    SetScanBoundary {
        left: TenthDegree,
        right: TenthDegree,
    },
    SetScanStep(TenthDegree),
    SetPulses(u8),
    SetScanRate(u8),
    /// Milliseconds, 0 stops the motor as soon as the scan stops.
    SetEngineSleep(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Directive {
    StartScan(ScanPlan),
    StopScan,
    /// Speed controller setpoint, increments per tick.
    SetSpeed(i32),
    ArmEngineSleep(u32),
    CancelEngineSleep,
}

pub type Directives = Vec<Directive, 4>;

fn directives(list: &[Directive]) -> Directives {
    list.iter().copied().collect()
}

/// Setpoint for a scan rate in revolutions per second.
pub fn speed_setpoint(scan_rate: u8, tick_ms: u32) -> i32 {
    (scan_rate as u32 * INC_PER_TURN as u32 * tick_ms / 1000) as i32
}

pub struct Supervisor {
    mode: Mode,
    config: ScanConfig,
    engine_sleep_ms: u32,
    tick_ms: u32,
    fault_count: u32,
    last_fault: Option<Fault>,
}

impl Supervisor {
    pub fn new(config: ScanConfig, tick_ms: u32) -> Self {
        Self {
            mode: Mode::Command,
            config,
            engine_sleep_ms: DEFAULT_ENGINE_SLEEP_MS,
            tick_ms,
            fault_count: 0,
            last_fault: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Configuration the next scan starts with.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn engine_sleep(&self) -> u32 {
        self.engine_sleep_ms
    }

    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    pub fn last_fault(&self) -> Option<Fault> {
        self.last_fault
    }

    /// Applies a command. Configuration changes are validated and stored,
    /// they take effect at the next scan start. On error nothing changes.
    pub fn command(&mut self, command: Command) -> Result<Directives, ConfigError> {
        match command {
            Command::EnterData => self.enter_data(),
            Command::EnterCommand => Ok(self.enter_command()),
            Command::SetScanBoundary { left, right } => {
                self.config = self.config.with_boundary(left, right)?;
                Ok(Directives::new())
            }
            Command::SetScanStep(step) => {
                self.config = self.config.with_step(step)?;
                Ok(Directives::new())
            }
            Command::SetPulses(pulses) => {
                self.config = self.config.with_pulses(pulses)?;
                Ok(Directives::new())
            }
            Command::SetScanRate(scan_rate) => {
                self.config = self.config.with_scan_rate(scan_rate)?;
                Ok(Directives::new())
            }
            Command::SetEngineSleep(ms) => {
                self.engine_sleep_ms = ms;
                Ok(Directives::new())
            }
        }
    }

    /// Sets the scan area and starts scanning with it.
    pub fn start_scan(
        &mut self,
        left: TenthDegree,
        right: TenthDegree,
        step: TenthDegree,
        pulses: u8,
    ) -> Result<Directives, ConfigError> {
        let config = ScanConfig {
            left,
            right,
            step,
            pulses,
            ..self.config
        };
        config.validate()?;

        self.config = config;
        self.enter_data()
    }

    pub fn stop_scan(&mut self, engine_sleep_ms: u32) -> Directives {
        self.engine_sleep_ms = engine_sleep_ms;
        self.enter_command()
    }

    /// Fatal faults stop scan and motor. Everything gets counted.
    pub fn on_fault(&mut self, fault: Fault) -> Directives {
        self.fault_count = self.fault_count.saturating_add(1);
        self.last_fault = Some(fault);

        match fault.severity() {
            Severity::Warning => Directives::new(),
            Severity::Fatal => {
                self.mode = Mode::Command;
                directives(&[
                    Directive::StopScan,
                    Directive::CancelEngineSleep,
                    Directive::SetSpeed(0),
                ])
            }
        }
    }

    /// Engine sleep timer fired.
    pub fn engine_sleep_expired(&mut self) -> Directives {
        match self.mode {
            Mode::Command => directives(&[Directive::SetSpeed(0)]),
            // Stale timer, scan was restarted.
            Mode::Data => Directives::new(),
        }
    }

    fn enter_data(&mut self) -> Result<Directives, ConfigError> {
        let plan = self.config.plan()?;
        self.mode = Mode::Data;

        Ok(directives(&[
            Directive::CancelEngineSleep,
            Directive::SetSpeed(speed_setpoint(self.config.scan_rate, self.tick_ms)),
            Directive::StartScan(plan),
        ]))
    }

    fn enter_command(&mut self) -> Directives {
        if self.mode == Mode::Command {
            return Directives::new();
        }
        self.mode = Mode::Command;

        if self.engine_sleep_ms == 0 {
            directives(&[Directive::StopScan, Directive::SetSpeed(0)])
        } else {
            directives(&[
                Directive::StopScan,
                Directive::ArmEngineSleep(self.engine_sleep_ms),
            ])
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(ScanConfig::default(), SPEED_TICK_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_setpoint() {
        assert_eq!(speed_setpoint(2, 10), 40);
        assert_eq!(speed_setpoint(10, 10), 200);
        assert_eq!(speed_setpoint(1, 1), 2);
    }

    #[test]
    fn test_enter_data() {
        let mut supervisor = Supervisor::default();
        assert_eq!(supervisor.mode(), Mode::Command);

        let directives = supervisor.command(Command::EnterData).unwrap();
        assert_eq!(supervisor.mode(), Mode::Data);
        assert_eq!(
            &directives[..],
            &[
                Directive::CancelEngineSleep,
                Directive::SetSpeed(40),
                Directive::StartScan(ScanPlan::default())
            ]
        );
    }

    #[test]
    fn test_enter_command() {
        let mut supervisor = Supervisor::default();

        // Already stopped.
        assert!(supervisor.command(Command::EnterCommand).unwrap().is_empty());

        supervisor.command(Command::EnterData).unwrap();
        let directives = supervisor.command(Command::EnterCommand).unwrap();
        assert_eq!(
            &directives[..],
            &[Directive::StopScan, Directive::SetSpeed(0)]
        );

        supervisor.command(Command::SetEngineSleep(5000)).unwrap();
        supervisor.command(Command::EnterData).unwrap();
        let directives = supervisor.command(Command::EnterCommand).unwrap();
        assert_eq!(
            &directives[..],
            &[Directive::StopScan, Directive::ArmEngineSleep(5000)]
        );
        assert_eq!(
            &supervisor.engine_sleep_expired()[..],
            &[Directive::SetSpeed(0)]
        );
    }

    #[test]
    fn test_stale_engine_sleep() {
        let mut supervisor = Supervisor::default();

        supervisor.command(Command::EnterData).unwrap();
        supervisor.stop_scan(1000);
        supervisor.command(Command::EnterData).unwrap();

        assert!(supervisor.engine_sleep_expired().is_empty());
    }

    #[test]
    fn test_config_applies_at_next_start() {
        let mut supervisor = Supervisor::default();
        supervisor.command(Command::EnterData).unwrap();

        let directives = supervisor.command(Command::SetScanStep(36)).unwrap();
        assert!(directives.is_empty());
        assert_eq!(supervisor.mode(), Mode::Data);

        supervisor.command(Command::EnterCommand).unwrap();
        let directives = supervisor.command(Command::EnterData).unwrap();
        match directives.last() {
            Some(Directive::StartScan(plan)) => assert_eq!(plan.step, 20),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut supervisor = Supervisor::default();
        let before = *supervisor.config();

        assert_eq!(
            supervisor.command(Command::SetScanRate(0)),
            Err(ConfigError::InvalidScanRate)
        );
        assert_eq!(
            supervisor.command(Command::SetScanBoundary {
                left: 500,
                right: 100
            }),
            Err(ConfigError::InvalidBoundary)
        );
        assert_eq!(
            supervisor.start_scan(-1000, 1000, 18, 0),
            Err(ConfigError::InvalidPulses)
        );

        assert_eq!(*supervisor.config(), before);
        assert_eq!(supervisor.mode(), Mode::Command);
    }

    #[test]
    fn test_start_scan() {
        let mut supervisor = Supervisor::default();

        let directives = supervisor.start_scan(-900, 900, 9, 10).unwrap();
        match directives.last() {
            Some(Directive::StartScan(plan)) => {
                assert_eq!(plan.left, 500);
                assert_eq!(plan.right, 1500);
                assert_eq!(plan.step, 5);
                assert_eq!(plan.pulses, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(supervisor.mode(), Mode::Data);
    }

    #[test]
    fn test_fault_policy() {
        let mut supervisor = Supervisor::default();
        supervisor.command(Command::EnterData).unwrap();

        assert!(supervisor.on_fault(Fault::TdcStatus(0x800)).is_empty());
        assert!(supervisor.on_fault(Fault::EngineStalled).is_empty());
        assert!(supervisor.on_fault(Fault::PoolExhausted).is_empty());
        assert_eq!(supervisor.mode(), Mode::Data);

        let directives = supervisor.on_fault(Fault::ProtocolViolation);
        assert_eq!(
            &directives[..],
            &[
                Directive::StopScan,
                Directive::CancelEngineSleep,
                Directive::SetSpeed(0)
            ]
        );
        assert_eq!(supervisor.mode(), Mode::Command);
        assert_eq!(supervisor.fault_count(), 4);
        assert_eq!(supervisor.last_fault(), Some(Fault::ProtocolViolation));
    }
}
