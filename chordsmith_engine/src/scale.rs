// Scales and the vocabulary filter.
//
// A `Scale` is a set of semitone offsets above a minor-frame root (see
// `Key::scale_root`). Two sentinels change the filter's behavior instead of
// naming pitch sets:
// - `disabled`: identity, the vocabulary passes through untouched.
// - `all_notes`: nothing is pruned; every instance with k optional tones is
//   replaced by its 2^k variants (each optional tone either promoted to a
//   required tone or dropped).
//
// Pruning keeps an instance iff every *required* pitch class lies in the
// transposed scale. Optional tones outside the scale are stripped from the
// survivors so they can never sound out of key.
//
// `ScaleInstance` is a scale bound to its root; the composer's passing-tone
// melody uses it to stay in key.

use crate::error::ValidationError;
use crate::pitch::{Key, PitchClass};
use crate::vocabulary::{ChordInstance, ChordTone, definition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named pitch-class set, or one of the two filter sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Disabled,
    AllNotes,
    /// Natural minor (Aeolian).
    Natural,
    /// Ascending melodic minor.
    Melodic,
    Harmonic,
    /// Minor pentatonic.
    Pentatonic,
    /// Romanian minor: raised 4th and 6th.
    Romanian,
    /// Hungarian minor: raised 4th and 7th.
    Hungarian,
    /// Octatonic starting with a half step.
    HalfWhole,
    /// Octatonic starting with a whole step.
    WholeHalf,
}

impl Scale {
    /// Semitone offsets above the scale root, or `None` for the sentinels.
    pub fn intervals(self) -> Option<&'static [u8]> {
        match self {
            Scale::Disabled | Scale::AllNotes => None,
            Scale::Natural => Some(&[0, 2, 3, 5, 7, 8, 10]),
            Scale::Melodic => Some(&[0, 2, 3, 5, 7, 9, 11]),
            Scale::Harmonic => Some(&[0, 2, 3, 5, 7, 8, 11]),
            Scale::Pentatonic => Some(&[0, 3, 5, 7, 10]),
            Scale::Romanian => Some(&[0, 2, 3, 6, 7, 9, 10]),
            Scale::Hungarian => Some(&[0, 2, 3, 6, 7, 8, 11]),
            Scale::HalfWhole => Some(&[0, 1, 3, 4, 6, 7, 9, 10]),
            Scale::WholeHalf => Some(&[0, 2, 3, 5, 6, 8, 9, 11]),
        }
    }

    pub fn is_pruning(self) -> bool {
        self.intervals().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scale::Disabled => "disabled",
            Scale::AllNotes => "all_notes",
            Scale::Natural => "natural",
            Scale::Melodic => "melodic",
            Scale::Harmonic => "harmonic",
            Scale::Pentatonic => "pentatonic",
            Scale::Romanian => "romanian",
            Scale::Hungarian => "hungarian",
            Scale::HalfWhole => "half_whole",
            Scale::WholeHalf => "whole_half",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let scale = match normalized.as_str() {
            "disabled" | "none" => Scale::Disabled,
            "all_notes" => Scale::AllNotes,
            "natural" | "natural_minor" => Scale::Natural,
            "melodic" | "melodic_minor" => Scale::Melodic,
            "harmonic" | "harmonic_minor" => Scale::Harmonic,
            "pentatonic" => Scale::Pentatonic,
            "romanian" | "romanian_minor" => Scale::Romanian,
            "hungarian" | "hungarian_minor" => Scale::Hungarian,
            "half_whole" => Scale::HalfWhole,
            "whole_half" => Scale::WholeHalf,
            _ => return Err(ValidationError::unknown("scale", s)),
        };
        Ok(scale)
    }
}

/// A pruning scale transposed to a concrete root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleInstance {
    pub root: PitchClass,
    intervals: &'static [u8],
}

impl ScaleInstance {
    /// Bind `scale` to `key`. The sentinels have no pitch set, so they bind
    /// as natural minor; callers that need the sentinel semantics check
    /// `Scale::is_pruning` first.
    pub fn new(scale: Scale, key: Key) -> Self {
        let intervals = scale
            .intervals()
            .or_else(|| Scale::Natural.intervals())
            .unwrap_or(&[]);
        ScaleInstance {
            root: key.scale_root(),
            intervals,
        }
    }

    /// The in-scale pitch classes as a boolean array indexed by pitch class.
    pub fn pitch_classes(&self) -> [bool; 12] {
        let mut pcs = [false; 12];
        for &interval in self.intervals {
            pcs[self.root.transpose(interval as i32).index()] = true;
        }
        pcs
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.intervals.contains(&pc.interval_from(self.root))
    }

    /// Check whether a MIDI pitch is in the scale.
    pub fn contains_pitch(&self, pitch: i32) -> bool {
        self.contains(PitchClass::new(pitch))
    }

    /// The nearest in-scale pitch strictly between `from` and `to`, closest
    /// to their midpoint. `None` when no scale tone lies between them.
    pub fn passing_tone(&self, from: i32, to: i32) -> Option<i32> {
        let (low, high) = if from <= to { (from, to) } else { (to, from) };
        let mid2 = low + high;
        ((low + 1)..high)
            .filter(|&p| self.contains_pitch(p))
            .min_by_key(|&p| ((2 * p - mid2).abs(), p))
    }
}

/// Apply `scale` to `vocabulary` in `key`.
///
/// Output order follows input order; `all_notes` variants of one instance
/// are adjacent, fewest added tones first.
pub fn filter_vocabulary(vocabulary: Vec<ChordInstance>, scale: Scale, key: Key) -> Vec<ChordInstance> {
    let filtered = match scale {
        Scale::Disabled => vocabulary,
        Scale::AllNotes => {
            let mut out = Vec::with_capacity(vocabulary.len());
            for chord in &vocabulary {
                for variant in optional_variants(chord) {
                    if !out.contains(&variant) {
                        out.push(variant);
                    }
                }
            }
            out
        }
        _ => {
            let instance = ScaleInstance::new(scale, key);
            let allowed = instance.pitch_classes();
            let mut out = Vec::with_capacity(vocabulary.len());
            for chord in vocabulary {
                if chord.fits(&allowed) {
                    let stripped = strip_out_of_scale(chord, &allowed);
                    if !out.contains(&stripped) {
                        out.push(stripped);
                    }
                }
            }
            out
        }
    };
    log::debug!("Scale {scale} in {key}: {} chords", filtered.len());
    filtered
}

/// Drop optional tones whose pitch class is outside `allowed`.
fn strip_out_of_scale(mut chord: ChordInstance, allowed: &[bool; 12]) -> ChordInstance {
    let root = chord.root;
    chord
        .tones
        .retain(|t| !t.optional || allowed[root.transpose(t.offset as i32).index()]);
    chord
}

/// All 2^k resolutions of `chord`'s optional tones.
///
/// Variant `mask` includes optional tone i iff bit i is set. Included tones
/// become required and are listed in the name, e.g. `Caug(+C)`.
pub fn optional_variants(chord: &ChordInstance) -> Vec<ChordInstance> {
    let optional: Vec<u8> = chord.optional_offsets().collect();
    if optional.is_empty() {
        return vec![chord.clone()];
    }
    let suffix = definition(chord.chord_type).map(|d| d.suffix).unwrap_or("");
    let base_name = format!("{}{}", chord.root.name(), suffix);

    (0u32..(1 << optional.len()))
        .map(|mask| {
            let mut tones: Vec<ChordTone> = chord
                .tones
                .iter()
                .filter(|t| !t.optional)
                .copied()
                .collect();
            let mut added = Vec::new();
            for (i, &offset) in optional.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    tones.push(ChordTone {
                        offset,
                        optional: false,
                    });
                    added.push(format!("+{}", chord.root.transpose(offset as i32).name()));
                }
            }
            tones.sort();
            tones.dedup();
            let name = if added.is_empty() {
                base_name.clone()
            } else {
                format!("{base_name}({})", added.join(","))
            };
            ChordInstance {
                name,
                chord_type: chord.chord_type,
                root: chord.root,
                tones,
            }
        })
        .collect()
}
