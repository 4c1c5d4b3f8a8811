//! The CPU seam.
//!
//! Instruction execution lives outside this crate. A core plugs in through
//! [`I8080`]: it runs against an [`IoBus`] for a cycle budget, ticking the
//! bus once per instruction, and stops early when it is about to fetch from
//! a trapped address so the machine can service the trap.

use emu_core::IoBus;

use crate::error::AccessFault;
use crate::traps::TrapTable;

/// i8080 register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    #[must_use]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[must_use]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[must_use]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }
}

/// Why [`I8080::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The budget was used up.
    Completed { cycles: u32 },
    /// PC reached a trapped address. The instruction there has not been
    /// fetched; `cycles` were executed before it.
    Trapped { address: u16, cycles: u32 },
}

impl RunExit {
    #[must_use]
    pub fn cycles(&self) -> u32 {
        match *self {
            RunExit::Completed { cycles } | RunExit::Trapped { cycles, .. } => cycles,
        }
    }
}

/// An i8080 core.
pub trait I8080 {
    /// Execute instructions until at least `budget` cycles have run or PC
    /// lands on an address in `traps`.
    ///
    /// # Errors
    ///
    /// Propagates the first [`AccessFault`] the bus raises.
    fn run<B: IoBus<Fault = AccessFault>>(
        &mut self,
        budget: u32,
        bus: &mut B,
        traps: &TrapTable,
    ) -> Result<RunExit, AccessFault>;

    fn registers(&self) -> Registers;

    fn set_registers(&mut self, registers: &Registers);

    /// Power-on state: all registers zero.
    fn reset(&mut self);

    /// The machine is suspended waiting on a file; cores that poll host
    /// state can back off.
    fn set_idle(&mut self, _idle: bool) {}
}

/// A core that executes nothing: each run just lets the clock advance
/// through the budget. Enough to drive video and audio headless.
#[derive(Debug, Clone, Default)]
pub struct IdleCpu {
    registers: Registers,
}

impl IdleCpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl I8080 for IdleCpu {
    fn run<B: IoBus<Fault = AccessFault>>(
        &mut self,
        budget: u32,
        bus: &mut B,
        _traps: &TrapTable,
    ) -> Result<RunExit, AccessFault> {
        bus.tick(budget);
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
}

/// Push a word the way `PUSH`/`CALL` do: SP decrements by two, high byte at
/// the higher address.
pub fn push_word<B: IoBus<Fault = AccessFault>>(
    registers: &mut Registers,
    bus: &mut B,
    value: u16,
) -> Result<(), AccessFault> {
    registers.sp = registers.sp.wrapping_sub(2);
    bus.write_word(registers.sp, value)
}

/// `CALL target` from the current PC.
pub fn gosub<B: IoBus<Fault = AccessFault>>(
    registers: &mut Registers,
    bus: &mut B,
    target: u16,
) -> Result<(), AccessFault> {
    let ret = registers.pc;
    push_word(registers, bus, ret)?;
    registers.pc = target;
    Ok(())
}
