use crate::acquisition;
use crate::error::Error;
use crate::event_queue::{Event, EventQueue};
use crate::state::StaticState;

use board::SerialTx;
use embedded_hal::blocking::serial::Write;
use rtt_target::rprintln;
use scanner::{Fault, Output, Processor};

// Marks the start of a revolution in the point stream.
const REVOLUTION_MARK: &[u8] = b"\r\n";

struct State {
    processor: Processor,
    tx: SerialTx,
}

impl State {
    fn process(&mut self) -> Result<(), Error> {
        while let Some(record) = acquisition::take_record() {
            match self.processor.process_record(&record) {
                Output::Point(point) => self.send(&point.encode())?,
                Output::Calibrated(offset) => {
                    rprintln!("offset {} mm", offset);
                    self.send(REVOLUTION_MARK)?;
                }
                Output::MissedCalibration => acquisition::report(Fault::MissedCalibration),
            }
        }

        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.tx.bwrite_all(bytes).map_err(|_| Error::Serial)
    }
}

static STATE: StaticState<State> = StaticState::new();

pub static PROCESS: Event = Event::new(&|| STATE.with(|state| state.process()).unwrap());

pub fn start(event_queue: &mut EventQueue<'_, 'static, 'static>, tx: SerialTx) {
    STATE.set(State {
        processor: Processor::default(),
        tx,
    });
    event_queue.bind(&PROCESS);
}
