//! Core traits and types shared by the emulator crates.
//!
//! The CPU talks to the rest of the machine only through [`Bus`] and
//! [`IoBus`]. Timing is counted in CPU cycles; [`MasterClock`] turns cycle
//! budgets into wall-clock frame durations.

mod bus;
mod clock;
mod observable;

pub use bus::{Bus, IoBus};
pub use clock::MasterClock;
pub use observable::{Observable, Value, parse_number};
