//! Test helpers: a default bus, tape block builders, a scripted CPU and a
//! notifier that records what it was told.

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::IoBus;

use crate::beeper::Beeper;
use crate::bus::LvivBus;
use crate::config::LvivConfig;
use crate::cpu::{I8080, Registers, RunExit};
use crate::error::AccessFault;
use crate::io::IoPorts;
use crate::keyboard::Keyboard;
use crate::memory::Memory;
use crate::notify::{Notice, Notifier};
use crate::tape::{TYPE_BASIC, TYPE_BINARY};
use crate::traps::TrapTable;

/// Bus built from the default configuration.
#[must_use]
pub fn make_bus() -> LvivBus {
    make_bus_with(&LvivConfig::default())
}

#[must_use]
pub fn make_bus_with(config: &LvivConfig) -> LvivBus {
    let beeper = Beeper::new(&config.beeper, &config.cpu);
    LvivBus::new(
        Memory::new(&config.memory),
        IoPorts::new(&config.io, &config.beeper, beeper, Keyboard::new()),
    )
}

fn block_header(kind: u8, name: &[u8; 6]) -> Vec<u8> {
    let mut block = b"LVOV/2.0/".to_vec();
    block.push(kind);
    block.extend_from_slice(name);
    block
}

/// Binary (0xD0) tape block loading `data` at `begin`.
#[must_use]
pub fn binary_block(name: &[u8; 6], begin: u16, start: u16, data: &[u8]) -> Vec<u8> {
    let end = begin.wrapping_add(data.len().saturating_sub(1) as u16);
    let mut block = block_header(TYPE_BINARY, name);
    block.extend_from_slice(&begin.to_le_bytes());
    block.extend_from_slice(&end.to_le_bytes());
    block.extend_from_slice(&start.to_le_bytes());
    block.extend_from_slice(data);
    block
}

/// BASIC (0xD3) tape block.
#[must_use]
pub fn basic_block(name: &[u8; 6], program: &[u8]) -> Vec<u8> {
    let mut block = block_header(TYPE_BASIC, name);
    block.extend_from_slice(program);
    block
}

/// A bus access the scripted CPU performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Out { port: u8, value: u8 },
    In { port: u8 },
    Write { address: u16, value: u8 },
    Read { address: u16 },
    /// Move PC, as a jump would.
    Jump(u16),
}

/// Stand-in CPU that replays bus accesses at fixed cycle offsets.
///
/// Offsets count cycles from the first `run`; `reset` clears the registers
/// but does not rewind the script. Time between steps is ticked onto the
/// bus in one go, so the beeper sees the timestamps a real core would give.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCpu {
    script: Vec<(u32, Step)>,
    next: usize,
    elapsed: u32,
    registers: Registers,
    /// Values returned by `In` and `Read` steps, in order.
    pub inputs: Vec<u8>,
    pub idle: bool,
}

impl ScriptedCpu {
    #[must_use]
    pub fn new(mut script: Vec<(u32, Step)>) -> Self {
        script.sort_by_key(|&(at, _)| at);
        Self {
            script,
            ..Self::default()
        }
    }

    /// Cycles run since construction.
    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Steps not yet performed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len() - self.next
    }

    fn perform<B: IoBus<Fault = AccessFault>>(&mut self, step: Step, bus: &mut B) -> Result<(), AccessFault> {
        match step {
            Step::Out { port, value } => bus.output(port, value),
            Step::In { port } => self.inputs.push(bus.input(port)),
            Step::Write { address, value } => bus.write(address, value)?,
            Step::Read { address } => self.inputs.push(bus.read(address)?),
            Step::Jump(target) => self.registers.pc = target,
        }
        Ok(())
    }
}

impl I8080 for ScriptedCpu {
    fn run<B: IoBus<Fault = AccessFault>>(
        &mut self,
        budget: u32,
        bus: &mut B,
        traps: &TrapTable,
    ) -> Result<RunExit, AccessFault> {
        let mut cycles = 0;
        loop {
            let pc = self.registers.pc;
            if traps.contains(pc) {
                return Ok(RunExit::Trapped { address: pc, cycles });
            }

            let Some(&(at, step)) = self.script.get(self.next) else {
                break;
            };
            let due = at.saturating_sub(self.elapsed);
            if cycles + due >= budget {
                break;
            }
            bus.tick(due);
            self.elapsed += due;
            cycles += due;
            self.next += 1;
            self.perform(step, bus)?;
        }

        let rest = budget - cycles;
        bus.tick(rest);
        self.elapsed += rest;
        Ok(RunExit::Completed { cycles: budget })
    }

    fn registers(&self) -> Registers {
        self.registers
    }

    fn set_registers(&mut self, registers: &Registers) {
        self.registers = *registers;
    }

    fn reset(&mut self) {
        self.registers = Registers::default();
    }

    fn set_idle(&mut self, idle: bool) {
        self.idle = idle;
    }
}

/// Notifier that keeps every notice, shared so a test can inspect it after
/// handing the notifier to a machine.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notice: Notice) {
        self.notices.borrow_mut().push(notice);
    }
}
