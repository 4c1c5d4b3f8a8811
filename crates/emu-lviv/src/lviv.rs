//! Top-level Lviv system.
//!
//! # Frame loop
//!
//! `run_frame()` applies at most one pending special key, runs the CPU for
//! `frame_cycles` cycles (44 800 at 2.2 MHz, one 20 ms frame), flushes the
//! beeper and renders VRAM. The report carries the delay until the next
//! frame is due: the frame period less the time spent running the CPU.
//!
//! # Tape loading
//!
//! The BASIC ROM's BLOAD/CLOAD routines are trapped (see [`crate::traps`]).
//! An attached file is loaded on the spot. With no file attached the
//! machine asks its [`FileSource`] for one and suspends until the task
//! resolves; without a source the ROM gets an I/O error.

use std::time::{Duration, Instant};

use emu_core::{Observable, Value, parse_number};

use crate::beeper::Beeper;
use crate::bus::LvivBus;
use crate::config::LvivConfig;
use crate::cpu::{I8080, IdleCpu, RunExit};
use crate::error::{FormatError, Result};
use crate::io::{IoPorts, PALETTE_PORT, PALETTE_RESET};
use crate::keyboard::{Keyboard, SpecialKey};
use crate::memory::{BANK_SIZE, Memory, TransferMode, TransferTarget};
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::scheduler::{FileSource, FrameReport, LoadResult, LoadTask, RunState, next_delay};
use crate::snapshot::{INTERCHANGE_RESTORED_PORTS, INTERCHANGE_TYPE, NATIVE_TYPE, Snapshot, SnapshotFormat};
use crate::tape::{self, TYPE_BASIC, TYPE_BINARY};
use crate::traps::{self, TrapAction, TrapKind, TrapTable};
use crate::video::{RenderStats, Screen};

/// What an outstanding file task is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPurpose {
    /// A trapped BLOAD/CLOAD waiting for its file.
    Trap(TrapKind),
    /// A user-initiated load: any file type.
    Manual,
}

struct PendingLoad {
    task: LoadTask,
    purpose: LoadPurpose,
}

/// PC-01 Lviv system.
pub struct Lviv<C: I8080 = IdleCpu> {
    config: LvivConfig,
    cpu: C,
    bus: LvivBus,
    screen: Screen,
    traps: TrapTable,
    rom: Vec<u8>,
    /// Tape file waiting for the next BLOAD/CLOAD.
    attached: Option<Vec<u8>>,
    pending: Option<PendingLoad>,
    paused: bool,
    suspended: bool,
    frame_count: u64,
    /// Output flushed on suspension, delivered with the next report.
    held_audio: Vec<f32>,
    held_render: Option<RenderStats>,
    notifier: Box<dyn Notifier>,
    files: Option<Box<dyn FileSource>>,
}

impl<C: I8080> Lviv<C> {
    /// Build a machine and burn `rom` into the ROM bank.
    ///
    /// # Errors
    ///
    /// [`ConfigError`](crate::ConfigError) if the configuration does not
    /// validate or the ROM image is larger than 16K.
    pub fn new(config: &LvivConfig, rom: Vec<u8>, mut cpu: C) -> Result<Self> {
        config.validate()?;

        let mut memory = Memory::new(&config.memory);
        memory.burn_rom(&rom)?;
        let beeper = Beeper::new(&config.beeper, &config.cpu);
        let io = IoPorts::new(&config.io, &config.beeper, beeper, Keyboard::new());
        cpu.reset();

        log::info!(
            "lviv: {} ({}), {}K, {} Hz, {} cycles/frame",
            config.profile.name(),
            config.profile.model(),
            config.memory.map.kilobytes(),
            config.cpu.clock_speed,
            config.cpu.frame_cycles
        );

        Ok(Self {
            config: *config,
            cpu,
            bus: LvivBus::new(memory, io),
            screen: Screen::new(config.screen.color_mode),
            traps: TrapTable::standard(),
            rom,
            attached: None,
            pending: None,
            paused: false,
            suspended: false,
            frame_count: 0,
            held_audio: Vec::new(),
            held_render: None,
            notifier: Box::new(LogNotifier),
            files: None,
        })
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_file_source(mut self, files: Box<dyn FileSource>) -> Self {
        self.files = Some(files);
        self
    }

    /// Run one frame.
    ///
    /// # Errors
    ///
    /// An [`AccessFault`](crate::AccessFault) raised by the CPU under
    /// strict mode, or a failure to encode a requested screenshot.
    pub fn run_frame(&mut self) -> Result<FrameReport> {
        let mut report = FrameReport::default();
        let mut cpu_time = Duration::ZERO;

        self.poll_load()?;

        if !self.suspended {
            let mut screenshot = false;
            if let Some(key) = self.bus.io.keyboard.take_special() {
                screenshot = self.apply_special(key)?;
            }

            if !self.paused {
                let started = Instant::now();
                report.cycles = self.run_cpu()?;
                cpu_time = started.elapsed();
            }

            // A trap that suspended the machine has already presented the
            // frame.
            if !self.suspended {
                self.held_audio.extend(self.bus.io.beeper.flush());
                report.render = Some(self.render());
            }

            if screenshot {
                report.screenshot = Some(self.screen.capture_snapshot()?);
            }
            self.frame_count += 1;
        }

        report.audio = std::mem::take(&mut self.held_audio);
        report.render = report.render.or(self.held_render.take());
        report.state = self.state();
        report.delay = next_delay(self.config.frame_duration(), cpu_time);
        Ok(report)
    }

    /// Run frames in real time, sleeping between them. `present` receives
    /// every report.
    pub fn run_realtime<F>(&mut self, frames: u64, mut present: F) -> Result<()>
    where
        F: FnMut(&Self, &FrameReport),
    {
        for _ in 0..frames {
            let report = self.run_frame()?;
            present(self, &report);
            if report.delay > Duration::ZERO {
                std::thread::sleep(report.delay);
            }
        }
        Ok(())
    }

    fn run_cpu(&mut self) -> Result<u32> {
        let budget = self.config.cpu.frame_cycles;
        let mut executed: u32 = 0;
        while executed < budget && !self.suspended {
            let exit = self.cpu.run(budget - executed, &mut self.bus, &self.traps)?;
            executed = executed.saturating_add(exit.cycles());
            if let RunExit::Trapped { address, .. } = exit {
                if self.service_trap(address)? == TrapAction::NoOp {
                    break;
                }
            }
        }
        Ok(executed)
    }

    fn service_trap(&mut self, address: u16) -> Result<TrapAction> {
        let Some(kind) = self.traps.get(address) else {
            log::warn!("lviv: CPU stopped at {address:#06X}, which is not trapped");
            return Ok(TrapAction::NoOp);
        };
        log::debug!("lviv: trap {kind:?} at {address:#06X}");

        match kind {
            TrapKind::Jump(_) => {
                let mut registers = self.cpu.registers();
                traps::enter_loader(&mut registers, &mut self.bus, kind)?;
                self.cpu.set_registers(&registers);
                Ok(TrapAction::Handled)
            }
            TrapKind::BinaryLoad | TrapKind::CassetteLoad => {
                if let Some(file) = self.attached.take() {
                    self.install(kind, &file)?;
                    return Ok(TrapAction::Handled);
                }
                if let Some(files) = self.files.as_mut() {
                    let task = files.open();
                    self.pending = Some(PendingLoad {
                        task,
                        purpose: LoadPurpose::Trap(kind),
                    });
                    self.suspend();
                    return Ok(TrapAction::NoOp);
                }
                self.io_error()?;
                Ok(TrapAction::Handled)
            }
        }
    }

    /// Load a tape file for a trapped BLOAD/CLOAD and steer the ROM to its
    /// success path, or to its I/O error handler.
    fn install(&mut self, kind: TrapKind, file: &[u8]) -> Result<()> {
        let loaded = match kind {
            TrapKind::BinaryLoad => tape::bload(&mut self.bus, file),
            TrapKind::CassetteLoad => tape::cload(&mut self.bus, file),
            TrapKind::Jump(_) => false,
        };
        self.attached = None;

        if loaded {
            let mut registers = self.cpu.registers();
            traps::enter_loader(&mut registers, &mut self.bus, kind)?;
            self.cpu.set_registers(&registers);
            self.notifier.notify(Notice::info("File loaded."));
            self.resume();
            Ok(())
        } else {
            self.io_error()
        }
    }

    fn io_error(&mut self) -> Result<()> {
        let mut registers = self.cpu.registers();
        traps::raise_io_error(&mut registers, &mut self.bus)?;
        self.cpu.set_registers(&registers);
        self.notifier.notify(Notice::error("I/O error."));
        self.resume();
        Ok(())
    }

    /// Check the outstanding file task and act on its result.
    fn poll_load(&mut self) -> Result<()> {
        let Some(result) = self.pending.as_ref().and_then(|p| p.task.poll()) else {
            return Ok(());
        };
        let Some(PendingLoad { purpose, .. }) = self.pending.take() else {
            return Ok(());
        };
        self.complete_load(purpose, result)
    }

    fn complete_load(&mut self, purpose: LoadPurpose, result: LoadResult) -> Result<()> {
        match (purpose, result) {
            (LoadPurpose::Trap(kind), Ok(file)) => self.install(kind, &file),
            (LoadPurpose::Trap(_), Err(e)) => {
                log::debug!("lviv: trapped load failed: {e}");
                self.io_error()
            }
            (LoadPurpose::Manual, Ok(file)) => {
                // Failures are reported through the notifier.
                let _ = self.load(file);
                self.resume();
                Ok(())
            }
            (LoadPurpose::Manual, Err(e)) => {
                self.notifier.notify(Notice::error(e.to_string()));
                self.resume();
                Ok(())
            }
        }
    }

    /// Ask the file source for a file and load it when it arrives. The
    /// machine is suspended meanwhile. Returns `false` if there is no file
    /// source or a load is already in flight.
    pub fn request_load(&mut self) -> bool {
        if self.pending.is_some() {
            return false;
        }
        let Some(files) = self.files.as_mut() else {
            return false;
        };
        let task = files.open();
        self.pending = Some(PendingLoad {
            task,
            purpose: LoadPurpose::Manual,
        });
        self.suspend();
        true
    }

    /// Load a snapshot, or attach a tape file for the next BLOAD/CLOAD,
    /// depending on byte 0x09.
    ///
    /// # Errors
    ///
    /// [`FormatError`] for an unknown type or a malformed snapshot; machine
    /// state is untouched. Errors are also sent to the notifier.
    pub fn load(&mut self, data: Vec<u8>) -> Result<()> {
        let result = self.try_load(data);
        if let Err(e) = &result {
            self.notifier.notify(Notice::error(e.to_string()));
        }
        result
    }

    fn try_load(&mut self, data: Vec<u8>) -> Result<()> {
        match tape::file_type(&data) {
            Some(NATIVE_TYPE | INTERCHANGE_TYPE) => {
                let snapshot = Snapshot::decode(&data)?;
                self.restore(&snapshot)?;
                log::info!("lviv: {} restored, PC={:#06X}", snapshot.format.name(), snapshot.registers.pc);
                self.notifier.notify(Notice::info("Snapshot loaded."));
            }
            Some(kind @ (TYPE_BINARY | TYPE_BASIC)) => {
                log::info!("lviv: tape file type {kind:#04X} attached");
                self.attach_file(data);
                self.notifier.notify(Notice::info("File attached."));
            }
            other => return Err(FormatError::UnknownFileType(other.unwrap_or(0)).into()),
        }
        Ok(())
    }

    /// Put a decoded snapshot into the machine.
    ///
    /// # Errors
    ///
    /// A [`RangeFault`](crate::RangeFault) if the snapshot's memory images
    /// are short. Nothing is touched in that case.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.validate()?;
        self.bus.io.restart();

        let mapping = self.bus.io.mapping();
        let rom = TransferTarget::Bank(self.bus.memory.rom_index());
        let vram = TransferTarget::Bank(self.bus.memory.vram_index());
        let memory = &mut self.bus.memory;
        memory.transfer(0x0000, 0xBFFF, &snapshot.ram, 0, TransferTarget::Mapped(mapping), TransferMode::Write)?;
        memory.transfer(0xC000, 0xFFFF, &snapshot.rom, 0, rom, TransferMode::Burn)?;
        memory.transfer(0x4000, 0x7FFF, &snapshot.vram, 0, vram, TransferMode::Write)?;

        match snapshot.format {
            SnapshotFormat::Native => {
                for (port, &value) in (0..=255u8).zip(snapshot.ports.iter()) {
                    self.bus.io.replay(port, value);
                }
                // The palette port is write-only on real hardware, so dumps
                // often hold 0xFF there.
                if self.bus.io.input(PALETTE_PORT) == 0xFF {
                    self.bus.io.output(PALETTE_PORT, PALETTE_RESET);
                }
            }
            SnapshotFormat::Interchange => {
                for port in INTERCHANGE_RESTORED_PORTS {
                    self.bus.io.set_register(port, snapshot.ports[usize::from(port)]);
                }
            }
        }

        self.cpu.reset();
        self.cpu.set_registers(&snapshot.registers);
        self.screen.invalidate_cache();
        Ok(())
    }

    /// Capture the machine state.
    ///
    /// Native snapshots record every port as `IN` would read it; interchange
    /// snapshots record the raw register contents.
    pub fn snapshot(&mut self, format: SnapshotFormat) -> Snapshot {
        let state = self.bus.memory.get_state();
        let (ram, rest) = state.split_at(3 * BANK_SIZE);
        let (rom, vram) = rest.split_at(BANK_SIZE);

        let ports = match format {
            SnapshotFormat::Native => Box::new(self.bus.io.get_state()),
            SnapshotFormat::Interchange => {
                let mut ports = Box::new([0; 256]);
                for (port, slot) in (0..=255u8).zip(ports.iter_mut()) {
                    *slot = self.bus.io.register(port);
                }
                ports
            }
        };

        Snapshot {
            format,
            ram: ram.to_vec(),
            rom: rom.to_vec(),
            vram: vram.to_vec(),
            ports,
            registers: self.cpu.registers(),
        }
    }

    /// Encode a native (`LVOV/DUMP/2.0/H+`) snapshot.
    pub fn save_snapshot(&mut self) -> Vec<u8> {
        self.snapshot(SnapshotFormat::Native).encode()
    }

    /// Encode an interchange (`Emulator 3000`) snapshot.
    pub fn save_interchange_snapshot(&mut self) -> Vec<u8> {
        self.snapshot(SnapshotFormat::Interchange).encode()
    }

    /// Power-cycle: clear everything, reburn the ROM, drop the attached
    /// file.
    pub fn reset(&mut self) -> Result<()> {
        self.bus.io.beeper.restart();
        self.bus.io.keyboard.reset();
        self.bus.io.restart();
        self.bus.memory.restart();
        self.bus.memory.burn_rom(&self.rom)?;
        self.cpu.reset();
        self.screen.restart();
        self.detach_file();
        log::info!("lviv: reset");
        Ok(())
    }

    /// Returns `true` if a screenshot should be taken this frame.
    fn apply_special(&mut self, key: SpecialKey) -> Result<bool> {
        log::debug!("lviv: special key {key:?}");
        match key {
            SpecialKey::Pause => self.set_paused(!self.paused),
            SpecialKey::Screenshot => return Ok(true),
            SpecialKey::Reset => self.reset()?,
            SpecialKey::Color => self.screen.toggle_color_mode(),
            SpecialKey::PaletteUp => Screen::shift_palette(&mut self.bus.io, 1),
            SpecialKey::PaletteDown => Screen::shift_palette(&mut self.bus.io, -1),
        }
        Ok(false)
    }

    fn render(&mut self) -> RenderStats {
        let palette = self.bus.io.palette();
        self.screen.render(self.bus.vram(), palette)
    }

    /// Stop scheduling until [`Lviv::resume`]. Audio and video are flushed
    /// once and delivered with the next report.
    pub fn suspend(&mut self) {
        if self.suspended {
            return;
        }
        self.suspended = true;
        self.cpu.set_idle(true);
        self.held_audio.extend(self.bus.io.beeper.flush());
        self.held_render = Some(self.render());
        log::debug!("lviv: suspended");
    }

    /// Continue after a suspension. Keys held when the machine stopped are
    /// released.
    pub fn resume(&mut self) {
        self.bus.io.keyboard.reset();
        if self.suspended {
            self.suspended = false;
            self.cpu.set_idle(false);
            log::debug!("lviv: resumed");
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        log::debug!("lviv: {}", if paused { "paused" } else { "running" });
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        if self.suspended {
            RunState::Suspended
        } else if self.paused {
            RunState::Paused
        } else {
            RunState::Running
        }
    }

    /// Latch a special key for the next frame.
    pub fn press_special(&mut self, key: SpecialKey) {
        self.bus.io.keyboard.press_special(key);
    }

    pub fn attach_file(&mut self, file: Vec<u8>) {
        self.attached = Some(file);
    }

    pub fn detach_file(&mut self) {
        self.attached = None;
    }

    #[must_use]
    pub fn attached_file(&self) -> Option<&[u8]> {
        self.attached.as_deref()
    }

    #[must_use]
    pub fn has_pending_load(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn config(&self) -> &LvivConfig {
        &self.config
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &LvivBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut LvivBus {
        &mut self.bus
    }

    #[must_use]
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn traps_mut(&mut self) -> &mut TrapTable {
        &mut self.traps
    }

    /// Framebuffer as ARGB32, 256×256.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.screen.framebuffer()
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl<C: I8080> Observable for Lviv<C> {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("memory.") {
            let address = u16::try_from(parse_number(rest)?).ok()?;
            Some(Value::U8(self.bus.peek(address)))
        } else if let Some(rest) = path.strip_prefix("io.") {
            let port = u8::try_from(parse_number(rest)?).ok()?;
            Some(Value::U8(self.bus.io.peek(port)))
        } else {
            match path {
                "palette" => Some(self.bus.io.palette().into()),
                "beeper.level" => Some(self.bus.io.beeper.level().into()),
                "cpu.pc" => Some(self.cpu.registers().pc.into()),
                "cpu.sp" => Some(self.cpu.registers().sp.into()),
                "frame_count" => Some(self.frame_count.into()),
                "state" => Some(self.state().name().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "memory.<address>",
            "io.<port>",
            "palette",
            "beeper.level",
            "cpu.pc",
            "cpu.sp",
            "frame_count",
            "state",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Registers;
    use crate::error::LvivError;
    use crate::io::MEDIA_PORT;
    use crate::testing::{RecordingNotifier, ScriptedCpu, Step, binary_block};
    use crate::traps::{BLOAD_ENTRY, CLOAD_TAIL};

    const FRAME: u32 = 44_800;

    fn make_lviv(script: Vec<(u32, Step)>) -> Lviv<ScriptedCpu> {
        let mut rom = vec![0; 0x4000];
        rom[0] = 0xC3;
        let mut lviv = Lviv::new(&LvivConfig::default(), rom, ScriptedCpu::new(script)).expect("valid config");
        lviv.cpu_mut().set_registers(&Registers {
            sp: 0xB000,
            ..Registers::default()
        });
        lviv
    }

    struct ReadySource(Option<Vec<u8>>);

    impl FileSource for ReadySource {
        fn open(&mut self) -> LoadTask {
            match self.0.take() {
                Some(file) => LoadTask::ready(Ok(file)),
                None => LoadTask::ready(Err(crate::LoadError::Cancelled)),
            }
        }
    }

    #[test]
    fn frame_runs_full_budget_and_renders() {
        let mut lviv = make_lviv(Vec::new());
        let report = lviv.run_frame().expect("frame");
        assert_eq!(report.cycles, FRAME);
        assert_eq!(report.render.map(|r| r.recomputed), Some(16_384));
        assert_eq!(report.state, RunState::Running);
        assert!(report.delay <= Duration::from_millis(20));
        assert_eq!(lviv.frame_count(), 1);

        let again = lviv.run_frame().expect("frame");
        assert_eq!(again.render.map(|r| r.recomputed), Some(0));
    }

    #[test]
    fn rom_is_burned_at_construction() {
        let lviv = make_lviv(Vec::new());
        assert_eq!(lviv.bus().peek(0xC000), 0xC3);
    }

    #[test]
    fn pause_key_stops_the_cpu() {
        let mut lviv = make_lviv(Vec::new());
        lviv.press_special(SpecialKey::Pause);
        let report = lviv.run_frame().expect("frame");
        assert_eq!(report.cycles, 0);
        assert_eq!(report.state, RunState::Paused);
        assert!(report.render.is_some());

        lviv.press_special(SpecialKey::Pause);
        assert_eq!(lviv.run_frame().expect("frame").cycles, FRAME);
    }

    #[test]
    fn delay_only_counts_cpu_time() {
        let mut lviv = make_lviv(Vec::new());
        let frame = lviv.config().frame_duration();
        lviv.set_paused(true);
        lviv.press_special(SpecialKey::Screenshot);
        let report = lviv.run_frame().expect("frame");
        // Rendering and PNG encoding happened, but no CPU time was spent.
        assert!(report.screenshot.is_some());
        assert_eq!(report.delay, frame);
    }

    #[test]
    fn palette_keys_step_the_register() {
        let mut lviv = make_lviv(Vec::new());
        lviv.press_special(SpecialKey::PaletteUp);
        lviv.run_frame().expect("frame");
        assert_eq!(lviv.bus().io.palette(), 0x90);

        lviv.press_special(SpecialKey::PaletteDown);
        lviv.run_frame().expect("frame");
        assert_eq!(lviv.bus().io.palette(), 0x8F);
    }

    #[test]
    fn screenshot_key_returns_png() {
        let mut lviv = make_lviv(Vec::new());
        lviv.press_special(SpecialKey::Screenshot);
        let report = lviv.run_frame().expect("frame");
        let png = report.screenshot.expect("screenshot taken");
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn reset_detaches_and_reburns() {
        let mut lviv = make_lviv(vec![(10, Step::Write { address: 0x1000, value: 0x55 })]);
        lviv.run_frame().expect("frame");
        assert_eq!(lviv.bus().peek(0x1000), 0x55);
        lviv.attach_file(vec![0; 0x20]);

        lviv.reset().expect("reset");
        assert_eq!(lviv.bus().peek(0x1000), 0);
        assert_eq!(lviv.bus().peek(0xC000), 0xC3);
        assert!(lviv.attached_file().is_none());
        assert_eq!(lviv.cpu().registers().pc, 0);
    }

    #[test]
    fn bload_trap_with_attached_file() {
        let mut lviv = make_lviv(vec![(100, Step::Jump(BLOAD_ENTRY))]);
        lviv.attach_file(binary_block(b"GAME  ", 0x9000, 0x9000, &[1, 2, 3]));

        let report = lviv.run_frame().expect("frame");
        assert_eq!(report.cycles, FRAME);
        assert_eq!(lviv.bus().peek(0x9002), 3);
        assert_eq!(lviv.cpu().registers().pc, 0xDD61);
        assert!(lviv.attached_file().is_none());
    }

    #[test]
    fn bload_trap_without_file_raises_io_error() {
        let notifier = RecordingNotifier::new();
        let mut lviv = make_lviv(vec![(100, Step::Jump(BLOAD_ENTRY))]).with_notifier(Box::new(notifier.clone()));

        lviv.run_frame().expect("frame");
        assert_eq!(lviv.cpu().registers().pc, 0xE4C7);
        assert_eq!(lviv.cpu().registers().sp, 0xB000 - 6);
        assert_eq!(notifier.notices(), vec![Notice::error("I/O error.")]);
    }

    #[test]
    fn bload_trap_suspends_until_the_file_arrives() {
        let block = binary_block(b"GAME  ", 0x9000, 0x9000, &[7]);
        let mut lviv = make_lviv(vec![(100, Step::Jump(BLOAD_ENTRY))])
            .with_file_source(Box::new(ReadySource(Some(block))));

        let first = lviv.run_frame().expect("frame");
        assert_eq!(first.state, RunState::Suspended);
        assert_eq!(first.cycles, 100);
        assert!(first.render.is_some());
        assert!(lviv.has_pending_load());
        assert!(lviv.cpu().idle);

        let second = lviv.run_frame().expect("frame");
        assert_eq!(second.state, RunState::Running);
        assert_eq!(second.cycles, FRAME);
        assert_eq!(lviv.bus().peek(0x9000), 7);
        assert_eq!(lviv.cpu().registers().pc, 0xDD61);
        assert!(!lviv.cpu().idle);
    }

    #[test]
    fn cload_tail_is_patched() {
        let mut lviv = make_lviv(vec![(5, Step::Jump(CLOAD_TAIL))]);
        lviv.run_frame().expect("frame");
        assert_eq!(lviv.cpu().registers().pc, 0xE561);
        assert_eq!(lviv.cpu().registers().sp, 0xB000);
    }

    #[test]
    fn manual_load_attaches_tape_file() {
        let block = binary_block(b"GAME  ", 0x9000, 0x9000, &[7]);
        let mut lviv = make_lviv(Vec::new()).with_file_source(Box::new(ReadySource(Some(block.clone()))));

        assert!(lviv.request_load());
        assert!(!lviv.request_load());
        assert_eq!(lviv.state(), RunState::Suspended);

        lviv.run_frame().expect("frame");
        assert_eq!(lviv.attached_file(), Some(&block[..]));
        assert_eq!(lviv.state(), RunState::Running);
    }

    #[test]
    fn cancelled_manual_load_resumes() {
        let notifier = RecordingNotifier::new();
        let mut lviv = make_lviv(Vec::new())
            .with_file_source(Box::new(ReadySource(None)))
            .with_notifier(Box::new(notifier.clone()));

        assert!(lviv.request_load());
        lviv.run_frame().expect("frame");
        assert_eq!(lviv.state(), RunState::Running);
        assert_eq!(notifier.notices(), vec![Notice::error("no file selected")]);
    }

    #[test]
    fn unknown_file_type_changes_nothing() {
        let mut lviv = make_lviv(Vec::new());
        let mut data = vec![0; 32];
        data[9] = 0x42;
        let err = lviv.load(data).unwrap_err();
        assert!(matches!(err, LvivError::Format(FormatError::UnknownFileType(0x42))));
        assert!(lviv.attached_file().is_none());
    }

    #[test]
    fn observable_paths() {
        let mut lviv = make_lviv(vec![(10, Step::Out { port: MEDIA_PORT, value: 0xFD })]);
        lviv.run_frame().expect("frame");

        assert_eq!(lviv.query("memory.0xC000"), Some(Value::U8(0xC3)));
        assert_eq!(lviv.query("io.0xC2"), Some(Value::U8(0xFD)));
        assert_eq!(lviv.query("palette"), Some(Value::U8(0x8F)));
        assert_eq!(lviv.query("cpu.sp"), Some(Value::U16(0xB000)));
        assert_eq!(lviv.query("frame_count"), Some(Value::U64(1)));
        assert_eq!(lviv.query("state"), Some(Value::String("running".into())));
        assert_eq!(lviv.query("memory.0x10000"), None);
        assert_eq!(lviv.query("nonsense"), None);
    }
}
