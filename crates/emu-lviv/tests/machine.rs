//! Whole-machine tests: snapshots through the loader, beeper output from
//! scripted port writes, paging, and trapped tape loads fed from disk.

use std::time::{Duration, Instant};

use emu_lviv::testing::{ScriptedCpu, Step, binary_block, make_bus};
use emu_lviv::traps::{BLOAD_ENTRY, TrapTable};
use emu_lviv::{
    AccessFault, AccessKind, BeeperConfig, ControlWordRead, FormatError, I8080, IoConfig, Lviv, LvivConfig, LvivError, MEDIA_PORT, MemoryConfig,
    PALETTE_PORT, PathSource, Registers, RunState, Screen, SnapshotFormat,
};

const FRAME: u32 = 44_800;

fn make_rom() -> Vec<u8> {
    (0..0x4000u32).map(|i| (i * 7) as u8).collect()
}

fn make_lviv_with(config: &LvivConfig, script: Vec<(u32, Step)>) -> Lviv<ScriptedCpu> {
    let mut lviv = Lviv::new(config, make_rom(), ScriptedCpu::new(script)).expect("valid config");
    lviv.cpu_mut().set_registers(&Registers {
        a: 0x12,
        f: 0x46,
        b: 0x01,
        c: 0x02,
        d: 0x03,
        e: 0x04,
        h: 0x05,
        l: 0x06,
        sp: 0xB000,
        pc: 0x0100,
    });
    lviv
}

fn make_lviv(script: Vec<(u32, Step)>) -> Lviv<ScriptedCpu> {
    make_lviv_with(&LvivConfig::default(), script)
}

/// A frame that leaves RAM, VRAM and the palette in a known state. Media
/// bit 0 stays clear.
fn busy_script() -> Vec<(u32, Step)> {
    vec![
        (10, Step::Write { address: 0x0000, value: 0x11 }),
        (20, Step::Write { address: 0x8123, value: 0x22 }),
        (30, Step::Out { port: PALETTE_PORT, value: 0x95 }),
        (40, Step::Out { port: MEDIA_PORT, value: 0xFC }),
        (50, Step::Write { address: 0x4000, value: 0xAA }),
        (60, Step::Write { address: 0x7FFF, value: 0x55 }),
        (70, Step::Out { port: MEDIA_PORT, value: 0xFE }),
        (80, Step::Write { address: 0x4000, value: 0x33 }),
    ]
}

#[test]
fn native_snapshot_survives_a_round_trip() {
    let mut source = make_lviv(busy_script());
    source.run_frame().expect("frame");
    let bytes = source.save_snapshot();
    assert_eq!(bytes.len(), 82_205);

    let mut target = make_lviv(Vec::new());
    target.load(bytes.clone()).expect("valid snapshot");

    assert_eq!(target.cpu().registers(), source.cpu().registers());
    assert_eq!(target.bus().peek(0x0000), 0x11);
    assert_eq!(target.bus().peek(0x8123), 0x22);
    assert_eq!(target.bus().peek(0x4000), 0x33);
    assert_eq!(target.bus().vram()[0], 0xAA);
    assert_eq!(target.bus().vram()[0x3FFF], 0x55);
    assert_eq!(target.bus().io.palette(), 0x95);
    assert_eq!(target.bus().io.register(MEDIA_PORT), 0xFE);
    assert_eq!(target.save_snapshot(), bytes);
}

#[test]
fn interchange_snapshot_survives_a_round_trip() {
    let mut source = make_lviv(busy_script());
    source.run_frame().expect("frame");
    let bytes = source.save_interchange_snapshot();
    assert_eq!(bytes.len(), 0x142C0);
    assert_eq!(&bytes[..13], b"Emulator 3000");

    let mut target = make_lviv(Vec::new());
    target.load(bytes.clone()).expect("valid snapshot");

    assert_eq!(target.cpu().registers(), source.cpu().registers());
    assert_eq!(target.bus().vram()[0x3FFF], 0x55);
    assert_eq!(target.bus().io.palette(), 0x95);
    assert_eq!(target.save_interchange_snapshot(), bytes);
}

#[test]
fn native_snapshot_keeps_reset_media_port() {
    for control_word_read in [ControlWordRead::Zero, ControlWordRead::Latched] {
        let config = LvivConfig {
            io: IoConfig {
                control_word_read,
                ..IoConfig::default()
            },
            ..LvivConfig::default()
        };
        let mut source = make_lviv_with(&config, Vec::new());
        assert_eq!(source.bus().io.register(MEDIA_PORT), 0xFF);
        let bytes = source.save_snapshot();

        let mut target = make_lviv_with(&config, Vec::new());
        target.load(bytes.clone()).expect("valid snapshot");
        assert_eq!(target.bus().io.register(MEDIA_PORT), 0xFF, "{control_word_read:?}");
        assert_eq!(target.save_snapshot(), bytes, "{control_word_read:?}");
    }
}

#[test]
fn short_snapshot_images_leave_machine_alone() {
    let mut source = make_lviv(busy_script());
    source.run_frame().expect("frame");
    let mut snapshot = source.snapshot(SnapshotFormat::Native);
    snapshot.vram.truncate(0x2000);

    let mut target = make_lviv(Vec::new());
    target.bus_mut().io.output(PALETTE_PORT, 0x95);
    let err = target.restore(&snapshot).unwrap_err();
    assert!(matches!(err, LvivError::Range(_)));
    assert_eq!(target.bus().peek(0x0000), 0);
    assert_eq!(target.bus().io.palette(), 0x95);
    assert_eq!(target.cpu().registers().pc, 0x0100);
}

#[test]
fn snapshot_with_unreadable_palette_gets_reset_palette() {
    let mut source = make_lviv(Vec::new());
    let mut snapshot = source.snapshot(SnapshotFormat::Native);
    // Every port number that decodes to the palette register.
    for port in 0..=255u8 {
        if port & 0x13 == 0x01 {
            snapshot.ports[usize::from(port)] = 0xFF;
        }
    }

    let mut target = make_lviv(Vec::new());
    target.load(snapshot.encode()).expect("valid snapshot");
    assert_eq!(target.bus().io.palette(), 0x8F);
}

#[test]
fn truncated_snapshot_leaves_machine_alone() {
    let mut source = make_lviv(busy_script());
    source.run_frame().expect("frame");
    let mut bytes = source.save_snapshot();
    bytes.truncate(0x1000);

    let mut target = make_lviv(Vec::new());
    let err = target.load(bytes).unwrap_err();
    assert!(matches!(err, LvivError::Format(FormatError::Truncated { .. })));
    assert_eq!(target.bus().peek(0x0000), 0);
    assert_eq!(target.cpu().registers().pc, 0x0100);
}

#[test]
fn beeper_runs_follow_media_writes() {
    let mut bus = make_bus();
    let mut cpu = ScriptedCpu::new(vec![
        (100, Step::Out { port: MEDIA_PORT, value: 0xFF }),
        (300, Step::Out { port: MEDIA_PORT, value: 0xFF }),
    ]);
    cpu.run(301, &mut bus, &TrapTable::new()).expect("no faults");
    assert_eq!(bus.io.beeper.runs(), &[100, 200]);
}

#[test]
fn frame_audio_holds_the_square_wave() {
    let config = LvivConfig {
        beeper: BeeperConfig {
            highpass_filter: false,
            ..BeeperConfig::default()
        },
        ..LvivConfig::default()
    };
    let mut lviv = make_lviv_with(
        &config,
        vec![
            (100, Step::Out { port: MEDIA_PORT, value: 0xFF }),
            (300, Step::Out { port: MEDIA_PORT, value: 0xFF }),
        ],
    );

    let audio = lviv.run_frame().expect("frame").audio;
    assert_eq!(audio.len(), 897);
    assert!(audio[..2].iter().all(|&s| s.abs() < 1e-6));
    assert!(audio[2..896].iter().all(|&s| (s - 0.15).abs() < 1e-6));
}

#[test]
fn palette_shift_wraps_after_128_steps() {
    let mut bus = make_bus();
    bus.io.output(PALETTE_PORT, 0xA5);
    for _ in 0..128 {
        Screen::shift_palette(&mut bus.io, 1);
    }
    assert_eq!(bus.io.palette(), 0xA5);
    for _ in 0..128 {
        Screen::shift_palette(&mut bus.io, -1);
    }
    assert_eq!(bus.io.palette(), 0xA5);
}

#[test]
fn strict_mode_stops_on_rom_write() {
    let config = LvivConfig {
        memory: MemoryConfig {
            strict_mode: true,
            ..MemoryConfig::default()
        },
        ..LvivConfig::default()
    };
    let mut lviv = make_lviv_with(&config, vec![(10, Step::Write { address: 0xC000, value: 0 })]);
    let err = lviv.run_frame().unwrap_err();
    assert!(matches!(
        err,
        LvivError::Access(AccessFault {
            kind: AccessKind::Write,
            address: 0xC000
        })
    ));
}

#[test]
fn lenient_mode_drops_rom_write() {
    let mut lviv = make_lviv(vec![(10, Step::Write { address: 0xC000, value: 0xFF })]);
    assert_eq!(lviv.run_frame().expect("frame").cycles, FRAME);
    assert_eq!(lviv.bus().peek(0xC000), make_rom()[0]);
}

#[test]
fn trapped_bload_reads_tape_from_disk() {
    let path = std::env::temp_dir().join(format!("emu-lviv-bload-{}.lvt", std::process::id()));
    std::fs::write(&path, binary_block(b"HELLO ", 0x9000, 0x9000, &[0xDE, 0xAD])).expect("temp file");

    let mut lviv = make_lviv(vec![(500, Step::Jump(BLOAD_ENTRY))])
        .with_file_source(Box::new(PathSource::new([path.clone()])));

    let first = lviv.run_frame().expect("frame");
    assert_eq!(first.state, RunState::Suspended);

    let start = Instant::now();
    while lviv.state() == RunState::Suspended {
        assert!(start.elapsed() < Duration::from_secs(5), "load never completed");
        std::thread::sleep(Duration::from_millis(1));
        lviv.run_frame().expect("frame");
    }

    assert_eq!(lviv.bus().peek(0x9000), 0xDE);
    assert_eq!(lviv.bus().peek(0x9001), 0xAD);
    assert_eq!(lviv.cpu().registers().pc, 0xDD61);
    let _ = std::fs::remove_file(path);
}
