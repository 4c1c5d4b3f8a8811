//! Machine configuration.
//!
//! A configuration is built from a named [`Profile`] preset or parsed from
//! JSON, then validated once. Subsystems receive only their own section.

use std::time::Duration;

use emu_core::MasterClock;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Installed RAM size, selecting the bank layout.
///
/// Serialised as the kilobyte count (80, 144 or 256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum MemoryMap {
    /// 48K RAM + 16K ROM + 16K VRAM (serial model).
    #[default]
    Kb80,
    /// Adds one bank of four 16K pages behind window 3.
    Kb144,
    /// Adds four banks of four 16K pages behind window 3.
    Kb256,
}

impl MemoryMap {
    /// Number of 16K banks in this layout.
    #[must_use]
    pub const fn bank_count(self) -> usize {
        match self {
            MemoryMap::Kb80 => 5,
            MemoryMap::Kb144 => 9,
            MemoryMap::Kb256 => 21,
        }
    }

    #[must_use]
    pub const fn kilobytes(self) -> u16 {
        match self {
            MemoryMap::Kb80 => 80,
            MemoryMap::Kb144 => 144,
            MemoryMap::Kb256 => 256,
        }
    }

    /// Whether window 3 can be switched to extension pages.
    #[must_use]
    pub const fn is_extended(self) -> bool {
        !matches!(self, MemoryMap::Kb80)
    }
}

impl TryFrom<u16> for MemoryMap {
    type Error = ConfigError;

    fn try_from(kb: u16) -> Result<Self, Self::Error> {
        match kb {
            80 => Ok(MemoryMap::Kb80),
            144 => Ok(MemoryMap::Kb144),
            256 => Ok(MemoryMap::Kb256),
            other => Err(ConfigError::UnknownMemoryMap(other)),
        }
    }
}

impl From<MemoryMap> for u16 {
    fn from(map: MemoryMap) -> Self {
        map.kilobytes()
    }
}

/// Hardware profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Profile {
    /// Serial production model.
    #[default]
    #[serde(rename = "pc01_lvov_80")]
    Lviv80,
    /// Serial model with the common beeper and VRAM paging modifications.
    #[serde(rename = "pc01_lvov_80_fixed")]
    Lviv80Fixed,
}

impl Profile {
    /// Look up a profile by name, accepting the historical aliases.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" | "standart" | "pc01_lvov" | "pc01_lvov_80" => Ok(Profile::Lviv80),
            "pc01_lvov_fixed" | "pc01_lvov_80_fixed" => Ok(Profile::Lviv80Fixed),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Profile::Lviv80 => "pc01_lvov_80",
            Profile::Lviv80Fixed => "pc01_lvov_80_fixed",
        }
    }

    #[must_use]
    pub const fn model(self) -> &'static str {
        "PC-01 \"Lviv\""
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Profile::Lviv80 => "Serial model",
            Profile::Lviv80Fixed => "Serial model with common modifications",
        }
    }
}

/// What a read of an 8255 control word port returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlWordRead {
    /// The register is write-only and reads as 0.
    #[default]
    Zero,
    /// Reads return the last byte written to the register.
    Latched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub map: MemoryMap,
    /// Fault on illegal accesses instead of logging and carrying on.
    pub strict_mode: bool,
    /// Route window 0 to bank 0 (instead of bank 2) while VRAM is paged in.
    pub fix_vram: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            map: MemoryMap::Kb80,
            strict_mode: false,
            fix_vram: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Decode port bits 4–5 too (mask 0x33 instead of 0x13), which makes
    /// the extended-mode port 0xF0 reachable.
    pub extended_features: bool,
    pub control_word_read: ControlWordRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeeperConfig {
    /// Drive the beeper regardless of the palette port's enable bit.
    pub fix_control: bool,
    pub allow_sound: bool,
    pub highpass_filter: bool,
}

impl Default for BeeperConfig {
    fn default() -> Self {
        Self {
            fix_control: false,
            allow_sound: true,
            highpass_filter: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub color_mode: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self { color_mode: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// i8080 clock in Hz.
    pub clock_speed: u32,
    /// CPU cycles executed per frame.
    pub frame_cycles: u32,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            clock_speed: 2_200_000,
            frame_cycles: 44_800,
        }
    }
}

/// Complete machine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LvivConfig {
    pub profile: Profile,
    pub memory: MemoryConfig,
    pub io: IoConfig,
    pub beeper: BeeperConfig,
    pub screen: ScreenConfig,
    pub cpu: CpuConfig,
    /// Run frames four times faster than real time.
    pub turbo: bool,
}

impl LvivConfig {
    /// Preset configuration for a hardware profile.
    #[must_use]
    pub fn for_profile(profile: Profile) -> Self {
        let fixed = profile == Profile::Lviv80Fixed;
        Self {
            profile,
            memory: MemoryConfig {
                fix_vram: fixed,
                ..MemoryConfig::default()
            },
            beeper: BeeperConfig {
                fix_control: fixed,
                ..BeeperConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration. Missing fields take the
    /// serial-model defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialise to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cpu.clock_speed == 0 {
            return Err(ConfigError::Zero { field: "cpu.clock_speed" });
        }
        if self.cpu.frame_cycles == 0 {
            return Err(ConfigError::Zero { field: "cpu.frame_cycles" });
        }
        Ok(())
    }

    #[must_use]
    pub fn clock(&self) -> MasterClock {
        MasterClock::new(self.cpu.clock_speed)
    }

    /// Wall-clock length of one frame, shortened fourfold in turbo mode.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        let millis = self.clock().frame_millis(self.cpu.frame_cycles);
        Duration::from_millis(if self.turbo { millis >> 2 } else { millis })
    }
}
