// Data-driven generator configuration.
//
// Every tunable constant the composer and codec use lives in
// `GeneratorConfig`: timebase, bar length, velocities, octaves, the chance
// that an optional chord tone sounds, and the redraw budget of the
// uniqueness window. Nothing in the pipeline hard-codes these numbers.
//
// The config is plain JSON with `#[serde(default)]`, so a file may set any
// subset of fields. Two requests with identical configs and identical
// deterministic inputs produce identical files; changing the config is a
// deliberate change of output.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for picking, placement and MIDI encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// MIDI timebase (ticks per quarter note). Must fit in 15 bits.
    pub ticks_per_quarter: u16,
    /// Beats in one bar; the default slot length of every placement mode.
    pub beats_per_bar: u32,
    /// Velocity of block chords and progression chords.
    pub default_velocity: u8,
    /// Lower bound of humanized velocities (inclusive).
    pub velocity_min: u8,
    /// Upper bound of humanized velocities (inclusive).
    pub velocity_max: u8,
    /// Octave of chord roots in scientific pitch notation (octave 4 puts a
    /// C root on MIDI note 60).
    pub chord_octave: u8,
    /// Octave of melody lines.
    pub melody_octave: u8,
    /// Probability that an optional chord tone is added to a block chord.
    pub optional_note_chance: f64,
    /// Redraws attempted before a uniqueness-constrained pick falls back to
    /// a direct choice among the allowed candidates.
    pub max_redraws: u32,
    /// Tempo meta event written at tick 0; omitted when `None`.
    pub tempo_bpm: Option<u16>,
    /// Whether `Engine` keeps built chord tables between requests.
    pub cache_tables: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            ticks_per_quarter: 96,
            beats_per_bar: 4,
            default_velocity: 80,
            velocity_min: 70,
            velocity_max: 90,
            chord_octave: 4,
            melody_octave: 5,
            optional_note_chance: 0.3,
            max_redraws: 64,
            tempo_bpm: None,
            cache_tables: true,
        }
    }
}

impl GeneratorConfig {
    /// Parse a config from a JSON string. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded generator config from {}", path.display());
        Ok(config)
    }

    /// Convert a length in beats (quarter notes) to ticks.
    pub fn beats_to_ticks(&self, beats: f64) -> u32 {
        (beats * self.ticks_per_quarter as f64).round() as u32
    }

    /// Ticks in one bar.
    pub fn bar_ticks(&self) -> u32 {
        self.beats_per_bar * self.ticks_per_quarter as u32
    }

    /// Velocity bounds ordered low-to-high, tolerant of a swapped config.
    pub fn velocity_range(&self) -> (u8, u8) {
        if self.velocity_min <= self.velocity_max {
            (self.velocity_min, self.velocity_max)
        } else {
            (self.velocity_max, self.velocity_min)
        }
    }
}
