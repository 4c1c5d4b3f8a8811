//! Beeper.
//!
//! The media port drives a one-bit speaker. Level changes are timestamped
//! in frame-relative CPU cycles and kept as a run-length list: run `i`
//! holds the duration of the `i`th stretch at a constant level. At the end
//! of a frame the runs are expanded to PCM at [`SAMPLE_RATE`], alternating
//! from off with run 0 whatever level the frame started at.

use std::f32::consts::PI;

use emu_core::MasterClock;

use crate::config::{BeeperConfig, CpuConfig};

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;
/// Amplitude of a high level.
pub const VOLUME: f32 = 0.15;
/// High-pass cutoff in Hz.
const HIGHPASS_HZ: f32 = 440.0;

/// First-order high-pass, `y[n] = α(y[n-1] + x[n] - x[n-1])`.
#[derive(Debug, Clone, Copy)]
struct HighPass {
    alpha: f32,
    prev_in: f32,
    prev_out: f32,
}

impl HighPass {
    fn new(cutoff_hz: f32, sample_rate: u32) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let dt = 1.0 / sample_rate as f32;
        Self {
            alpha: rc / (rc + dt),
            prev_in: 0.0,
            prev_out: 0.0,
        }
    }

    fn apply(&mut self, input: f32) -> f32 {
        let output = self.alpha * (self.prev_out + input - self.prev_in);
        self.prev_in = input;
        self.prev_out = output;
        output
    }

    fn reset(&mut self) {
        self.prev_in = 0.0;
        self.prev_out = 0.0;
    }
}

/// Beeper state for the current frame.
#[derive(Debug, Clone)]
pub struct Beeper {
    allow_sound: bool,
    cycles_per_sample: u32,
    buffer_len: usize,
    filter: Option<HighPass>,
    /// Run durations in CPU cycles since the last flush.
    runs: Vec<u32>,
    /// Level credited to the last run.
    last_run_level: Option<u8>,
    level: u8,
    /// Frame-relative cycle count, advanced by the bus.
    clock: u32,
    last_change: u32,
}

impl Beeper {
    #[must_use]
    pub fn new(config: &BeeperConfig, cpu: &CpuConfig) -> Self {
        let cycles_per_sample = MasterClock::new(cpu.clock_speed).cycles_per_sample(SAMPLE_RATE);
        Self {
            allow_sound: config.allow_sound,
            cycles_per_sample,
            buffer_len: cpu.frame_cycles.div_ceil(cycles_per_sample) as usize + 1,
            filter: config.highpass_filter.then(|| HighPass::new(HIGHPASS_HZ, SAMPLE_RATE)),
            runs: Vec::new(),
            last_run_level: None,
            level: 0,
            clock: 0,
            last_change: 0,
        }
    }

    /// Advance the frame clock.
    pub fn tick(&mut self, cycles: u32) {
        self.clock = self.clock.wrapping_add(cycles);
    }

    /// Record a write of `state` (0 or 1) at the current frame offset.
    ///
    /// Time since the previous call is credited to the level that was in
    /// force; a change of level starts a new run.
    pub fn process(&mut self, state: u8) {
        let state = state & 1;
        self.credit(self.clock - self.last_change);
        self.last_change = self.clock;
        self.level = state;
    }

    fn credit(&mut self, cycles: u32) {
        match self.runs.last_mut() {
            Some(last) if self.last_run_level == Some(self.level) => *last += cycles,
            _ => self.runs.push(cycles),
        }
        self.last_run_level = Some(self.level);
    }

    /// Credit the time since the last change up to the current clock, so
    /// the runs cover the whole frame.
    pub fn close_frame(&mut self) {
        if self.clock > self.last_change || self.runs.is_empty() {
            self.credit(self.clock - self.last_change);
            self.last_change = self.clock;
        }
    }

    /// Expand the frame's runs to PCM and start a new frame.
    ///
    /// Returns an empty buffer when sound is disabled. The runs are
    /// cleared and the frame clock returns to zero either way.
    pub fn flush(&mut self) -> Vec<f32> {
        self.close_frame();

        let mut samples = Vec::new();
        if self.allow_sound {
            samples.resize(self.buffer_len, 0.0);
            let mut n = 0;
            for (i, &run) in self.runs.iter().enumerate() {
                let value = if i & 1 == 1 { VOLUME } else { 0.0 };
                let count = (run + self.cycles_per_sample / 2) / self.cycles_per_sample;
                let end = (n + count as usize).min(samples.len());
                samples[n..end].fill(value);
                n = end;
            }
            if let Some(filter) = &mut self.filter {
                for sample in &mut samples {
                    *sample = filter.apply(*sample);
                }
            }
        }

        self.runs.clear();
        self.last_run_level = None;
        self.clock = 0;
        self.last_change = 0;
        samples
    }

    /// Run durations recorded since the last flush.
    #[must_use]
    pub fn runs(&self) -> &[u32] {
        &self.runs
    }

    /// Current speaker level (0 or 1).
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Frame-relative CPU cycle count.
    #[must_use]
    pub fn clock(&self) -> u32 {
        self.clock
    }

    #[must_use]
    pub fn cycles_per_sample(&self) -> u32 {
        self.cycles_per_sample
    }

    pub fn restart(&mut self) {
        self.runs.clear();
        self.last_run_level = None;
        self.level = 0;
        self.clock = 0;
        self.last_change = 0;
        if let Some(filter) = &mut self.filter {
            filter.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_beeper(highpass: bool) -> Beeper {
        Beeper::new(
            &BeeperConfig {
                fix_control: false,
                allow_sound: true,
                highpass_filter: highpass,
            },
            &CpuConfig::default(),
        )
    }

    fn process_at(beeper: &mut Beeper, cycle: u32, state: u8) {
        beeper.tick(cycle - beeper.clock());
        beeper.process(state);
    }

    #[test]
    fn two_high_writes_split_into_two_runs() {
        let mut beeper = make_beeper(false);
        process_at(&mut beeper, 100, 1);
        process_at(&mut beeper, 300, 1);
        assert_eq!(beeper.runs(), &[100, 200]);
    }

    #[test]
    fn repeated_level_extends_run() {
        let mut beeper = make_beeper(false);
        process_at(&mut beeper, 50, 0);
        process_at(&mut beeper, 80, 0);
        assert_eq!(beeper.runs(), &[80]);
        process_at(&mut beeper, 100, 1);
        process_at(&mut beeper, 150, 1);
        process_at(&mut beeper, 170, 1);
        assert_eq!(beeper.runs(), &[100, 70]);
    }

    #[test]
    fn run_sum_equals_elapsed_cycles() {
        let mut beeper = make_beeper(false);
        for (cycle, state) in [(10, 1), (25, 0), (25, 1), (90, 1), (400, 0)] {
            process_at(&mut beeper, cycle, state);
        }
        beeper.tick(600);
        beeper.close_frame();
        assert_eq!(beeper.runs().iter().sum::<u32>(), 1000);
    }

    #[test]
    fn flush_expands_runs_to_samples() {
        let mut beeper = make_beeper(false);
        assert_eq!(beeper.cycles_per_sample(), 50);
        process_at(&mut beeper, 500, 1);
        process_at(&mut beeper, 1000, 0);

        let samples = beeper.flush();
        // ceil(44800 / 50) + 1
        assert_eq!(samples.len(), 897);
        assert!(samples[..10].iter().all(|&s| s == 0.0));
        assert!(samples[10..20].iter().all(|&s| s == VOLUME));
        assert_eq!(samples[20], 0.0);

        assert!(beeper.runs().is_empty());
        assert_eq!(beeper.clock(), 0);
    }

    #[test]
    fn playback_restarts_from_off_each_frame() {
        let mut beeper = make_beeper(false);
        process_at(&mut beeper, 100, 1);
        let _ = beeper.flush();
        assert_eq!(beeper.level(), 1);

        // The frame starts high, but run 0 still plays as off.
        process_at(&mut beeper, 100, 0);
        process_at(&mut beeper, 200, 0);
        assert_eq!(beeper.runs(), &[100, 100]);
        let samples = beeper.flush();
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[2], VOLUME);
    }

    #[test]
    fn highpass_removes_dc() {
        let mut beeper = make_beeper(true);
        process_at(&mut beeper, 0, 1);
        beeper.tick(44_800);
        let samples = beeper.flush();
        assert!(samples[0] > 0.1);
        assert!(samples[800].abs() < 0.01);
    }

    #[test]
    fn silent_when_sound_disabled() {
        let mut beeper = Beeper::new(
            &BeeperConfig {
                allow_sound: false,
                ..BeeperConfig::default()
            },
            &CpuConfig::default(),
        );
        process_at(&mut beeper, 100, 1);
        assert!(beeper.flush().is_empty());
        assert_eq!(beeper.clock(), 0);
    }
}
