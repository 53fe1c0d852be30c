#![cfg_attr(not(test), no_std)]

use core::cell::Cell;
use core::cell::RefCell;
use critical_section::Mutex;
use intrusive_collections::{intrusive_adapter, LinkedList, LinkedListLink};

// Millisecond-precision time. Good for 49 days before rollover.
pub type Instant = fugit::Instant<u32, 1, 1000>;
pub type Duration = fugit::MillisDurationU32;

pub struct EventQueue<'e, 'h> {
    events: LinkedList<EventAdapter<'e, 'h>>,
}

intrusive_adapter!(EventAdapter<'e, 'h> = &'e Event<'h>: Event<'h> { link: LinkedListLink });

impl<'e, 'h> EventQueue<'e, 'h> {
    pub fn new() -> Self {
        EventQueue {
            events: LinkedList::new(EventAdapter::new()),
        }
    }

    pub fn bind(&mut self, event: &'e Event<'h>) {
        self.events.push_back(event);
    }

    // Check all registered events once and execute all pending handlers.
    // Returns number of dispatched handlers.
    pub fn run_once(&mut self, time: Instant) -> usize {
        let mut dispatched = 0;
        let mut cursor = self.events.front();

        while let Some(event) = cursor.get() {
            if event.take_due(time) {
                event.handler.borrow()();
                dispatched += 1;
            }

            cursor.move_next();
        }

        dispatched
    }
}

impl<'e, 'h> Default for EventQueue<'e, 'h> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventState {
    Done,
    DispatchNow,
    DispatchAt(Instant),
}

pub struct Event<'h> {
    // Only changes in EventQueue::bind()
    link: LinkedListLink,
    state: Mutex<RefCell<EventState>>,
    period: Mutex<Cell<Option<Duration>>>,
    handler: RefCell<&'h dyn Fn()>, // Never changes
}

unsafe impl<'h> Sync for Event<'h> {}

impl<'h> Event<'h> {
    pub const fn new(handler: &'h dyn Fn()) -> Self {
        Self {
            link: LinkedListLink::new(),
            state: Mutex::new(RefCell::new(EventState::Done)),
            period: Mutex::new(Cell::new(None)),
            handler: RefCell::new(handler),
        }
    }

    // Post event into message queue for immediate dispatch.
    // This function is interrupt-safe.
    pub fn call(&self) {
        critical_section::with(|cs| {
            self.state.replace(cs, EventState::DispatchNow);
        });
    }

    // Post an event into message queue with a delay before dispatching the event.
    // This function is interrupt-safe.
    pub fn call_at(&self, time: Instant) {
        critical_section::with(|cs| {
            self.state.replace(cs, EventState::DispatchAt(time));
        });
    }

    // Drop pending dispatch, if any. A periodic event stops repeating until posted again.
    // This function is interrupt-safe.
    pub fn cancel(&self) {
        critical_section::with(|cs| {
            self.state.replace(cs, EventState::Done);
        });
    }

    // This function is interrupt-safe.
    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| *self.state.borrow_ref(cs) != EventState::Done)
    }

    // Set period for repeatedly dispatching an event. Repetition starts
    // with the next call() or call_at().
    // This function is interrupt-safe.
    pub fn period(&self, period: Duration) {
        critical_section::with(|cs| {
            self.period.borrow(cs).set(Some(period));
        });
    }

    // This function is interrupt-safe.
    pub fn clear_period(&self) {
        critical_section::with(|cs| {
            self.period.borrow(cs).set(None);
        });
    }

    // Check and rearm in one critical section, so a post from an interrupt
    // between the check and the rearm is not lost.
    fn take_due(&self, time: Instant) -> bool {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);

            let scheduled = match *state {
                EventState::Done => return false,
                EventState::DispatchNow => time,
                EventState::DispatchAt(dispatch_time) if dispatch_time <= time => dispatch_time,
                EventState::DispatchAt(_) => return false,
            };

            // Periodic events keep their phase relative to the schedule, not
            // to the moment the queue got around to them.
            *state = match self.period.borrow(cs).get() {
                Some(period) => EventState::DispatchAt(scheduled + period),
                None => EventState::Done,
            };

            true
        })
    }
}
