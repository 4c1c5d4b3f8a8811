//! PC-01 Lviv emulator binary.
//!
//! Headless: no CPU core is linked in, so the machine runs on an
//! [`IdleCpu`] that only burns cycles. That is enough to restore a
//! snapshot, render its screen, convert between snapshot formats and
//! exercise the frame scheduler.

use std::path::{Path, PathBuf};
use std::process;

use emu_lviv::{IdleCpu, Lviv, LvivConfig, LvivError, PathSource, Profile, capture};

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Writes log records to stderr. The level comes from `LVIV_LOG`
/// (`error`, `warn`, `info`, `debug`, `trace`; default `warn`).
struct StderrLogger {
    level: log::LevelFilter,
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging() {
    let level = std::env::var("LVIV_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(log::LevelFilter::Warn);
    let logger = Box::new(StderrLogger { level });
    if log::set_boxed_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    profile: String,
    config_path: Option<PathBuf>,
    rom_path: Option<PathBuf>,
    snapshot_path: Option<PathBuf>,
    tape_paths: Vec<PathBuf>,
    frames: u64,
    realtime: bool,
    screenshot_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
    convert_path: Option<PathBuf>,
    dump_config: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        profile: Profile::default().name().to_string(),
        config_path: None,
        rom_path: None,
        snapshot_path: None,
        tape_paths: Vec::new(),
        frames: 50,
        realtime: false,
        screenshot_path: None,
        audio_path: None,
        convert_path: None,
        dump_config: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--profile" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.profile = s.to_lowercase();
                }
            }
            "--config" => {
                i += 1;
                cli.config_path = args.get(i).map(PathBuf::from);
            }
            "--rom" => {
                i += 1;
                cli.rom_path = args.get(i).map(PathBuf::from);
            }
            "--snapshot" => {
                i += 1;
                cli.snapshot_path = args.get(i).map(PathBuf::from);
            }
            "--tape" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.tape_paths.push(PathBuf::from(s));
                }
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(50);
                }
            }
            "--realtime" => {
                cli.realtime = true;
            }
            "--screenshot" => {
                i += 1;
                cli.screenshot_path = args.get(i).map(PathBuf::from);
            }
            "--audio" => {
                i += 1;
                cli.audio_path = args.get(i).map(PathBuf::from);
            }
            "--convert" => {
                i += 1;
                cli.convert_path = args.get(i).map(PathBuf::from);
            }
            "--dump-config" => {
                cli.dump_config = true;
            }
            "--help" | "-h" => {
                eprintln!("Usage: emu-lviv [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --profile <name>     pc01_lvov_80 or pc01_lvov_80_fixed [default: pc01_lvov_80]");
                eprintln!("  --config <file>      JSON configuration (overrides --profile)");
                eprintln!("  --rom <file>         16K BASIC ROM image");
                eprintln!("  --snapshot <file>    Load a snapshot or attach a tape file");
                eprintln!("  --tape <file>        Tape file handed out on BLOAD/CLOAD (repeatable)");
                eprintln!("  --frames <n>         Number of frames to run [default: 50]");
                eprintln!("  --realtime           Pace frames at the machine's frame rate");
                eprintln!("  --screenshot <file>  Save a PNG of the last frame");
                eprintln!("  --audio <file>       Save a WAV of the beeper output");
                eprintln!("  --convert <file>     Save the machine state as a native snapshot");
                eprintln!("  --dump-config        Print the configuration as JSON and exit");
                eprintln!();
                eprintln!("Set LVIV_LOG=info (or debug) for diagnostics.");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn read_file(path: &Path, what: &str) -> Vec<u8> {
    match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read {what} {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn make_config(cli: &CliArgs) -> LvivConfig {
    if let Some(path) = &cli.config_path {
        let json = read_file(path, "config");
        let json = String::from_utf8_lossy(&json);
        return match LvivConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid config {}: {e}", path.display());
                process::exit(1);
            }
        };
    }
    match Profile::from_name(&cli.profile) {
        Ok(profile) => LvivConfig::for_profile(profile),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn make_lviv(cli: &CliArgs, config: &LvivConfig) -> Lviv<IdleCpu> {
    let rom = match &cli.rom_path {
        Some(path) => read_file(path, "ROM"),
        None => {
            log::warn!("no ROM given; the ROM bank is empty");
            Vec::new()
        }
    };

    let mut lviv = match Lviv::new(config, rom, IdleCpu::new()) {
        Ok(lviv) => lviv,
        Err(e) => {
            eprintln!("Failed to start: {e}");
            process::exit(1);
        }
    };

    if !cli.tape_paths.is_empty() {
        lviv = lviv.with_file_source(Box::new(PathSource::new(cli.tape_paths.iter().cloned())));
    }

    if let Some(path) = &cli.snapshot_path {
        let data = read_file(path, "snapshot");
        if let Err(e) = lviv.load(data) {
            eprintln!("Failed to load {}: {e}", path.display());
            process::exit(1);
        }
    }

    lviv
}

fn main() {
    init_logging();
    let cli = parse_args();
    let config = make_config(&cli);

    if cli.dump_config {
        match config.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
        return;
    }

    let mut lviv = make_lviv(&cli, &config);
    eprintln!("{}", config.profile.description());

    let mut audio = Vec::new();
    let result = if cli.realtime {
        lviv.run_realtime(cli.frames, |_, report| audio.extend_from_slice(&report.audio))
    } else {
        (0..cli.frames).try_for_each(|_| {
            let report = lviv.run_frame()?;
            audio.extend(report.audio);
            Ok::<(), LvivError>(())
        })
    };
    if let Err(e) = result {
        eprintln!("Emulation stopped: {e}");
        process::exit(1);
    }

    if let Some(path) = &cli.screenshot_path {
        let saved = lviv
            .screen()
            .capture_snapshot()
            .and_then(|png| capture::save_screenshot(&png, path).map_err(LvivError::from));
        if let Err(e) = saved {
            eprintln!("Screenshot error: {e}");
            process::exit(1);
        }
        eprintln!("Screenshot saved to {}", path.display());
    }

    if let Some(path) = &cli.audio_path {
        if let Err(e) = capture::save_audio(&audio, path) {
            eprintln!("Audio error: {e}");
            process::exit(1);
        }
        eprintln!("Audio saved to {}", path.display());
    }

    if let Some(path) = &cli.convert_path {
        if let Err(e) = std::fs::write(path, lviv.save_snapshot()) {
            eprintln!("Failed to write {}: {e}", path.display());
            process::exit(1);
        }
        eprintln!("Snapshot saved to {}", path.display());
    }
}
