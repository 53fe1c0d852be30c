#![deny(unsafe_code)]
#![no_std]
#![no_main]

mod acquisition;
mod board;
mod error;
mod event_queue;
mod hw;
mod processing;
mod speed;
mod state;
mod supervisor;
mod system_time;

use crate::board::Board;
use crate::event_queue::EventQueue;

use cortex_m_rt::entry;
use rtt_target::{rprintln, rtt_init_print};
use scanner::{Acquisition, Command, ScanConfig};
use stm32f1xx_hal::pac;

use panic_probe as _;

#[entry]
fn main() -> ! {
    rtt_init_print!();

    let cp = pac::CorePeripherals::take().unwrap();
    let dp = pac::Peripherals::take().unwrap();

    let board = Board::new(cp, dp).unwrap();
    let mut event_queue = EventQueue::new(&board.ticker);

    acquisition::init(
        Acquisition::new(board.encoder, board.laser, board.tdc),
        board.tdc_irq,
        board.index,
    );
    processing::start(&mut event_queue, board.serial_tx);
    speed::start(&mut event_queue, board.motor, board.laser_alert);
    supervisor::start(&mut event_queue, ScanConfig::default());

    rprintln!("scanning");
    supervisor::command(Command::EnterData).unwrap();

    event_queue.run_forever();
}
