#![no_std]

mod baro;
mod clock;

pub use baro::*;
pub use clock::*;
