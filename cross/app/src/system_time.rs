#![deny(unsafe_code)]

use core::cell::Cell;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
use cortex_m_rt::exception;
use critical_section::Mutex;
use stm32f1xx_hal::rcc::Clocks;

pub use event_queue::{Duration, Instant};

const TICK_HZ: u32 = 1000;

static TICKS: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

pub struct Ticker {
    // Held so nothing else reconfigures SysTick.
    _syst: SYST,
}

impl Ticker {
    // Setup SysTick to tick at 1kHz
    pub fn new(mut syst: SYST, clocks: &Clocks) -> Self {
        let reload = clocks.sysclk().raw() / TICK_HZ - 1;
        assert!(reload <= 0x00ff_ffff);

        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(reload);
        syst.clear_current();
        syst.enable_interrupt();
        syst.enable_counter();

        Ticker { _syst: syst }
    }

    pub fn now(&self) -> Instant {
        now()
    }
}

// Get timestamp
pub fn now() -> Instant {
    let ticks = critical_section::with(|cs| TICKS.borrow(cs).get());
    Instant::from_ticks(ticks)
}

#[exception]
fn SysTick() {
    critical_section::with(|cs| {
        let ticks = TICKS.borrow(cs).get();
        TICKS.borrow(cs).set(ticks.wrapping_add(1));
    });
}
