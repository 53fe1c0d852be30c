//! Acquisition sequencing.
//!
//! Each revolution runs through resonator calibration, propagation delay
//! calibration at the reference target, and one measurement per scan step.
//! [`transition`] decides what to do for each hardware event; [`Acquisition`]
//! carries the actions out on the hardware, the sample pool and the fault
//! sink. Everything here runs in interrupt context and never blocks.

use heapless::Vec;

use gp22::StatusClass;

use crate::angle::{self, Increment};
use crate::config::ScanPlan;
use crate::fault::{Fault, FaultSink};
use crate::hw::{Encoder, PulseGenerator, RangingSensor};
use crate::record::{Handle, SamplePool};

/// Allowed encoder error at the index pulse.
pub const INDEX_TOLERANCE: u16 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    Idle,
    /// Waiting for the resonator calibration angle.
    ResonatorCalibration,
    /// Resonator calibration running, waiting for the reference target.
    PropagationCalibration,
    /// Waiting for the next measurement point.
    Measuring { next: Increment },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Encoder reached the armed capture position.
    Capture,
    /// TDC finished a measurement or a calibration.
    RangingReady,
    /// Last laser pulse of a burst went out.
    BurstComplete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Arm(Increment),
    SuspendAutoCalibration,
    StartResonatorCalibration,
    LatchResonatorCalibration,
    RestoreConfiguration,
    /// Allocate a record and fire a burst for this position.
    BeginPoint(Increment),
    CollectSample,
    FinishPoint,
}

pub type Actions = Vec<Action, 4>;

fn actions(list: &[Action]) -> Actions {
    list.iter().copied().collect()
}

/// Next state and the actions to take for an event.
pub fn transition(state: State, event: Event, plan: &ScanPlan) -> (State, Actions) {
    use Action::*;

    match (state, event) {
        (State::Idle, _) => (State::Idle, Actions::new()),

        (State::ResonatorCalibration, Event::Capture) => (
            State::PropagationCalibration,
            actions(&[
                Arm(plan.reference),
                SuspendAutoCalibration,
                StartResonatorCalibration,
            ]),
        ),

        (State::PropagationCalibration, Event::Capture) => (
            State::Measuring { next: plan.left },
            actions(&[
                Arm(plan.left),
                LatchResonatorCalibration,
                RestoreConfiguration,
                BeginPoint(plan.reference),
            ]),
        ),

        (State::Measuring { next }, Event::Capture) => {
            let following = next as u32 + plan.step as u32;

            if following > plan.right as u32 {
                (
                    State::ResonatorCalibration,
                    actions(&[Arm(plan.resonator), BeginPoint(next)]),
                )
            } else {
                let following = following as Increment;
                (
                    State::Measuring { next: following },
                    actions(&[Arm(following), BeginPoint(next)]),
                )
            }
        }

        // Resonator calibration result, picked up at the reference capture.
        (State::PropagationCalibration, Event::RangingReady) => (state, Actions::new()),

        // Samples of the last point of a revolution arrive after the resonator
        // calibration capture is armed.
        (_, Event::RangingReady) => (state, actions(&[CollectSample])),
        (_, Event::BurstComplete) => (state, actions(&[FinishPoint])),
    }
}

pub struct Acquisition<E, P, S> {
    encoder: E,
    laser: P,
    sensor: S,
    state: State,
    plan: ScanPlan,
    in_flight: Option<Handle>,
    resonator_calibration: u32,
    // First abnormal status seen during the current burst.
    burst_status: Option<u16>,
}

impl<E, P, S> Acquisition<E, P, S>
where
    E: Encoder,
    P: PulseGenerator,
    S: RangingSensor,
{
    pub fn new(encoder: E, laser: P, sensor: S) -> Self {
        Self {
            encoder,
            laser,
            sensor,
            state: State::Idle,
            plan: ScanPlan::default(),
            in_flight: None,
            resonator_calibration: 0,
            burst_status: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    pub fn is_running(&self) -> bool {
        self.state != State::Idle
    }

    /// True while a record is being filled.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn resonator_calibration(&self) -> u32 {
        self.resonator_calibration
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn encoder_mut(&mut self) -> &mut E {
        &mut self.encoder
    }

    pub fn laser(&self) -> &P {
        &self.laser
    }

    pub fn laser_mut(&mut self) -> &mut P {
        &mut self.laser
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn release(self) -> (E, P, S) {
        (self.encoder, self.laser, self.sensor)
    }

    /// Starts a new scan with the given plan, stopping the current one first.
    pub fn start<const N: usize>(&mut self, plan: ScanPlan, pool: &mut SamplePool<N>) {
        self.stop(pool);

        self.plan = plan;
        self.state = State::ResonatorCalibration;
        self.encoder.arm_capture(plan.resonator);
    }

    /// Stops capture handling and returns the record in flight, if any, to
    /// the pool. Safe to call when already stopped.
    pub fn stop<const N: usize>(&mut self, pool: &mut SamplePool<N>) {
        self.encoder.disarm();
        self.state = State::Idle;
        self.burst_status = None;

        if let Some(handle) = self.in_flight.take() {
            pool.release(handle);
        }
    }

    /// Handles one hardware event. Returns true if a record was queued for
    /// processing.
    pub fn handle<const N: usize, F: FaultSink>(
        &mut self,
        event: Event,
        pool: &mut SamplePool<N>,
        faults: &mut F,
    ) -> bool {
        let (state, actions) = transition(self.state, event, &self.plan);
        self.state = state;

        let mut submitted = false;
        for action in actions {
            submitted |= self.apply(action, pool, faults);
        }

        submitted
    }

    /// Index pulse. Checks the encoder count while scanning, then zeroes it.
    pub fn zero_reference<F: FaultSink>(&mut self, faults: &mut F) {
        if self.state != State::Idle {
            let offset = angle::signed_distance(0, self.encoder.position()).unsigned_abs() as u16;
            if offset > INDEX_TOLERANCE {
                faults.report(Fault::EncoderDesync(offset));
            }
        }

        self.encoder.zero();
    }

    fn apply<const N: usize, F: FaultSink>(
        &mut self,
        action: Action,
        pool: &mut SamplePool<N>,
        faults: &mut F,
    ) -> bool {
        match action {
            Action::Arm(target) => self.encoder.arm_capture(target),
            Action::SuspendAutoCalibration => {
                if self.sensor.suspend_auto_calibration().is_err() {
                    faults.report(Fault::SensorBus);
                }
            }
            Action::StartResonatorCalibration => {
                if self.sensor.start_resonator_calibration().is_err() {
                    faults.report(Fault::SensorBus);
                }
            }
            Action::LatchResonatorCalibration => match self.sensor.read_result() {
                Ok(code) => self.resonator_calibration = code,
                Err(_) => faults.report(Fault::SensorBus),
            },
            Action::RestoreConfiguration => {
                if self.sensor.restore_configuration().is_err() {
                    faults.report(Fault::SensorBus);
                }
            }
            Action::BeginPoint(increments) => self.begin_point(increments, pool, faults),
            Action::CollectSample => self.collect_sample(pool, faults),
            Action::FinishPoint => return self.finish_point(pool, faults),
        }

        false
    }

    fn begin_point<const N: usize, F: FaultSink>(
        &mut self,
        increments: Increment,
        pool: &mut SamplePool<N>,
        faults: &mut F,
    ) {
        if self.in_flight.is_some() {
            // Previous burst hasn't completed. Skip this point.
            faults.report(Fault::ProtocolViolation);
            return;
        }

        let handle = match pool.acquire() {
            Some(handle) => handle,
            None => {
                faults.report(Fault::PoolExhausted);
                return;
            }
        };

        pool.record_mut(&handle)
            .reset(increments, self.resonator_calibration, self.plan.pulses);
        self.burst_status = None;

        if self.sensor.start_measurement().is_err() {
            pool.release(handle);
            faults.report(Fault::SensorBus);
            return;
        }

        self.in_flight = Some(handle);
        self.laser.start_burst(self.plan.pulses);
    }

    fn collect_sample<const N: usize, F: FaultSink>(
        &mut self,
        pool: &mut SamplePool<N>,
        faults: &mut F,
    ) {
        let handle = match self.in_flight.as_ref() {
            Some(handle) => handle,
            None => {
                faults.report(Fault::UnexpectedSample);
                return;
            }
        };

        let status = match self.sensor.read_status() {
            Ok(status) => status,
            Err(_) => {
                faults.report(Fault::SensorBus);
                return;
            }
        };

        match S::classify(status) {
            StatusClass::Ok => match self.sensor.read_result() {
                Ok(code) => {
                    if !pool.record_mut(handle).push(code) {
                        faults.report(Fault::UnexpectedSample);
                    }
                }
                Err(_) => {
                    faults.report(Fault::SensorBus);
                    return;
                }
            },
            StatusClass::NoReflection => {
                if self.burst_status.is_none() {
                    self.burst_status = Some(status);
                }
            }
            StatusClass::Malfunction => {
                let keep = match self.burst_status {
                    Some(previous) => S::classify(previous) != StatusClass::Malfunction,
                    None => true,
                };
                if keep {
                    self.burst_status = Some(status);
                }
            }
        }

        if !pool.record(handle).is_complete() && self.sensor.start_measurement().is_err() {
            faults.report(Fault::SensorBus);
        }
    }

    fn finish_point<const N: usize, F: FaultSink>(
        &mut self,
        pool: &mut SamplePool<N>,
        faults: &mut F,
    ) -> bool {
        let handle = match self.in_flight.take() {
            Some(handle) => handle,
            None => {
                faults.report(Fault::UnexpectedSample);
                return false;
            }
        };

        let burst_status = self.burst_status.take();

        if !pool.record(&handle).is_complete() {
            let status = match burst_status {
                Some(status) => Some(status),
                None => self.sensor.read_status().ok(),
            };

            match status {
                Some(status) => {
                    if S::classify(status) == StatusClass::Malfunction {
                        faults.report(Fault::TdcStatus(status));
                    }
                }
                None => faults.report(Fault::SensorBus),
            }
        }

        match pool.submit(handle) {
            Ok(()) => true,
            Err(handle) => {
                faults.report(Fault::QueueOverflow);
                // Keep it, the supervisor stops the scan.
                self.in_flight = Some(handle);
                false
            }
        }
    }
}
