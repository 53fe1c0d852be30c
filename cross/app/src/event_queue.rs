#![deny(unsafe_code)]

use crate::system_time::Ticker;
use cortex_m::asm::wfi;

pub use event_queue::Event;

pub struct EventQueue<'t, 'e, 'h> {
    queue: event_queue::EventQueue<'e, 'h>,
    ticker: &'t Ticker,
}

impl<'t, 'e, 'h> EventQueue<'t, 'e, 'h> {
    pub fn new(ticker: &'t Ticker) -> Self {
        EventQueue {
            queue: event_queue::EventQueue::new(),
            ticker,
        }
    }

    pub fn bind(&mut self, event: &'e Event<'h>) {
        self.queue.bind(event);
    }

    pub fn run_forever(mut self) -> ! {
        loop {
            self.queue.run_once(self.ticker.now());
            wfi();
        }
    }
}
