use crate::hw::{LaserPulser, QuadratureEncoder};
use crate::{processing, supervisor};

use board::{EncoderIndex, SpiBus, SpiCs, TdcInterrupt};
use core::cell::RefCell;
use critical_section::Mutex;
use gp22::Gp22;
use scanner::acquisition::Event;
use scanner::angle::Increment;
use scanner::hw::Encoder;
use scanner::record::QUEUE_LENGTH;
use scanner::{Acquisition, Fault, FaultQueue, FaultSink, SamplePool, SampleRecord, ScanPlan};
use stm32f1xx_hal::gpio::ExtiPin;
use stm32f1xx_hal::pac::{self, interrupt, NVIC};

pub type Tdc = Gp22<SpiBus, SpiCs>;
pub type Scanner = Acquisition<QuadratureEncoder, LaserPulser, Tdc>;

const FAULT_QUEUE_LENGTH: usize = 16;

struct Lines {
    tdc: TdcInterrupt,
    index: EncoderIndex,
}

// Shared between the interrupt handlers below and the main loop.
static SCANNER: Mutex<RefCell<Option<Scanner>>> = Mutex::new(RefCell::new(None));
static LINES: Mutex<RefCell<Option<Lines>>> = Mutex::new(RefCell::new(None));
static POOL: Mutex<RefCell<SamplePool<QUEUE_LENGTH>>> =
    Mutex::new(RefCell::new(SamplePool::new()));
static FAULTS: Mutex<RefCell<FaultQueue<FAULT_QUEUE_LENGTH>>> =
    Mutex::new(RefCell::new(FaultQueue::new()));

#[allow(unsafe_code)]
pub fn init(scanner: Scanner, tdc: TdcInterrupt, index: EncoderIndex) {
    critical_section::with(|cs| {
        SCANNER.borrow(cs).replace(Some(scanner));
        LINES.borrow(cs).replace(Some(Lines { tdc, index }));
    });

    // Handlers and their state are in place.
    unsafe {
        NVIC::unmask(pac::Interrupt::EXTI1);
        NVIC::unmask(pac::Interrupt::TIM1_CC);
        NVIC::unmask(pac::Interrupt::TIM4);
        NVIC::unmask(pac::Interrupt::EXTI0);
    }
}

pub fn start(plan: ScanPlan) {
    critical_section::with(|cs| {
        if let Some(scanner) = SCANNER.borrow_ref_mut(cs).as_mut() {
            scanner.start(plan, &mut *POOL.borrow_ref_mut(cs));
        }
    });
}

pub fn stop() {
    critical_section::with(|cs| {
        if let Some(scanner) = SCANNER.borrow_ref_mut(cs).as_mut() {
            scanner.stop(&mut *POOL.borrow_ref_mut(cs));
        }
    });
}

pub fn position() -> Option<Increment> {
    critical_section::with(|cs| {
        SCANNER
            .borrow_ref(cs)
            .as_ref()
            .map(|scanner| scanner.encoder().position())
    })
}

/// Copies the oldest filled record and returns its slot to the pool.
pub fn take_record() -> Option<SampleRecord> {
    critical_section::with(|cs| {
        let mut pool = POOL.borrow_ref_mut(cs);
        let handle = pool.take()?;
        let record = *pool.record(&handle);
        pool.release(handle);

        Some(record)
    })
}

pub fn report(fault: Fault) {
    critical_section::with(|cs| FAULTS.borrow_ref_mut(cs).report(fault));
    supervisor::SUPERVISE.call();
}

pub fn take_fault() -> Option<Fault> {
    critical_section::with(|cs| FAULTS.borrow_ref_mut(cs).pop())
}

pub fn take_dropped_faults() -> u32 {
    critical_section::with(|cs| FAULTS.borrow_ref_mut(cs).take_dropped())
}

fn dispatch(event: Event) {
    critical_section::with(|cs| {
        let mut scanner = SCANNER.borrow_ref_mut(cs);
        let scanner = match scanner.as_mut() {
            Some(scanner) => scanner,
            None => return,
        };
        let mut pool = POOL.borrow_ref_mut(cs);
        let mut faults = FAULTS.borrow_ref_mut(cs);

        if scanner.handle(event, &mut *pool, &mut *faults) {
            processing::PROCESS.call();
        }
        if !faults.is_empty() {
            supervisor::SUPERVISE.call();
        }
    });
}

#[interrupt]
fn EXTI1() {
    critical_section::with(|cs| {
        if let Some(lines) = LINES.borrow_ref_mut(cs).as_mut() {
            lines.tdc.clear_interrupt_pending_bit();
        }
    });

    dispatch(Event::RangingReady);
}

#[interrupt]
fn TIM1_CC() {
    let captured = critical_section::with(|cs| {
        SCANNER
            .borrow_ref_mut(cs)
            .as_mut()
            .map_or(false, |scanner| scanner.encoder_mut().clear_capture())
    });

    if captured {
        dispatch(Event::Capture);
    }
}

#[interrupt]
fn TIM4() {
    let complete = critical_section::with(|cs| {
        SCANNER
            .borrow_ref_mut(cs)
            .as_mut()
            .map_or(false, |scanner| scanner.laser_mut().on_pulse())
    });

    if complete {
        dispatch(Event::BurstComplete);
    }
}

#[interrupt]
fn EXTI0() {
    critical_section::with(|cs| {
        if let Some(lines) = LINES.borrow_ref_mut(cs).as_mut() {
            lines.index.clear_interrupt_pending_bit();
        }

        if let Some(scanner) = SCANNER.borrow_ref_mut(cs).as_mut() {
            let mut faults = FAULTS.borrow_ref_mut(cs);
            scanner.zero_reference(&mut *faults);
            if !faults.is_empty() {
                supervisor::SUPERVISE.call();
            }
        }
    });
}
