//! PC-01 "Lviv" hardware emulation.
//!
//! The machine is an i8080 at 2.2 MHz with 16K banks behind a window
//! router, two 8255 PPIs for keyboard, palette, media and printer, a
//! 256×256 four-colour bitmap display and a one-bit beeper. The CPU itself
//! plugs in through [`I8080`]; this crate provides everything around it
//! and the frame scheduler that drives it.

mod beeper;
mod bus;
pub mod capture;
mod config;
mod cpu;
mod error;
mod io;
pub mod keyboard;
mod lviv;
mod memory;
pub mod notify;
pub mod scheduler;
pub mod snapshot;
pub mod tape;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod traps;
pub mod video;

pub use beeper::{Beeper, SAMPLE_RATE};
pub use bus::LvivBus;
pub use config::{
    BeeperConfig, ControlWordRead, CpuConfig, IoConfig, LvivConfig, MemoryConfig, MemoryMap, Profile, ScreenConfig,
};
pub use cpu::{I8080, IdleCpu, Registers, RunExit, gosub, push_word};
pub use error::{
    AccessFault, AccessKind, CaptureError, ConfigError, FormatError, LoadError, LvivError, RangeFault, Result,
};
pub use io::{IoPorts, MEDIA_PORT, PALETTE_PORT};
pub use keyboard::{Keyboard, SpecialKey};
pub use lviv::Lviv;
pub use memory::{BANK_SIZE, BankRole, Memory, MemoryBank, PageMapping, TransferMode, TransferTarget};
pub use notify::{LogNotifier, Notice, Notifier, Severity};
pub use scheduler::{FileSource, FrameReport, LoadTask, PathSource, RunState};
pub use snapshot::{Snapshot, SnapshotFormat};
pub use video::{RenderStats, Screen};
