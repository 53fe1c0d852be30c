#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod acquisition;
pub mod angle;
pub mod config;
pub mod encode;
pub mod fault;
pub mod hw;
pub mod processing;
pub mod record;
pub mod supervisor;


pub use acquisition::Acquisition;
pub use angle::{Increment, TenthDegree, INC_PER_TURN};
pub use config::{ConfigError, ScanConfig, ScanPlan};
pub use fault::{Fault, FaultQueue, FaultSink, Severity};
pub use processing::{Output, Point, Processor};
pub use record::{Handle, SamplePool, SampleRecord};
pub use supervisor::{Command, Directive, Mode, Supervisor};
