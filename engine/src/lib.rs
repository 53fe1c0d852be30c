#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod controller;
mod motor;

pub use controller::{ControllerConfig, ControllerState, SpeedController, Tick};
pub use motor::{Direction, Error, Motor};
