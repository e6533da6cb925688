// Pitch classes, note names and keys.
//
// A `PitchClass` is a note modulo the octave (0 = C … 11 = B). Keys are a
// tonic plus a major/minor mode, or the `random` sentinel that is resolved
// once per request from the request RNG.
//
// All scale tables (scale.rs) and curated chord roots (vocabulary.rs) are
// written relative to a *minor* root. `Key::scale_root` maps any key onto
// that frame: a minor key's root is its tonic, a major key's root is its
// relative minor (tonic + 9 semitones). C major therefore prunes with the
// same pitch classes as A natural minor.

use crate::error::ValidationError;
use chordsmith_prng::MusicRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sharp-spelled note names indexed by pitch class.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A note name modulo the octave, 0 (C) through 11 (B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    /// Build a pitch class from any semitone count, wrapping into 0-11.
    pub fn new(semitones: i32) -> Self {
        PitchClass(semitones.rem_euclid(12) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Transpose upward by `semitones` (may be negative), wrapping.
    pub fn transpose(self, semitones: i32) -> Self {
        PitchClass::new(self.0 as i32 + semitones)
    }

    /// Semitones from `root` up to `self`, in 0-11.
    pub fn interval_from(self, root: PitchClass) -> u8 {
        (self.0 + 12 - root.0) % 12
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }

    /// All twelve pitch classes in ascending order.
    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0u8..12).map(PitchClass)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ValidationError;

    /// Parses `C`, `c#`, `Db`, `Bb` and so on. Flats are accepted for input
    /// but output is always sharp-spelled.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_note_prefix(s.trim())
            .filter(|(_, rest)| rest.is_empty())
            .map(|(pc, _)| pc)
            .ok_or_else(|| ValidationError::InvalidNote(s.to_string()))
    }
}

/// Parse a note name at the start of `s`, returning the pitch class and the
/// unconsumed remainder.
fn parse_note_prefix(s: &str) -> Option<(PitchClass, &str)> {
    let mut chars = s.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let natural = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = &s[letter.len_utf8()..];
    if let Some(after) = rest.strip_prefix('#') {
        Some((PitchClass::new(natural + 1), after))
    } else if let Some(after) = rest.strip_prefix('b') {
        // "b" followed by nothing or a mode suffix is a flat; "Bb" is B flat.
        Some((PitchClass::new(natural - 1), after))
    } else {
        Some((PitchClass::new(natural), rest))
    }
}

/// Major or minor tonality of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyMode {
    Major,
    Minor,
}

/// A concrete key: tonic plus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: KeyMode,
}

impl Key {
    pub fn new(tonic: PitchClass, mode: KeyMode) -> Self {
        Key { tonic, mode }
    }

    pub fn c_minor() -> Self {
        Key::new(PitchClass::C, KeyMode::Minor)
    }

    /// The minor-frame root that scale tables and curated roots are
    /// transposed to.
    pub fn scale_root(self) -> PitchClass {
        match self.mode {
            KeyMode::Minor => self.tonic,
            KeyMode::Major => self.tonic.transpose(9),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.mode {
            KeyMode::Major => "maj",
            KeyMode::Minor => "min",
        };
        write!(f, "{}{}", self.tonic, suffix)
    }
}

/// A key as requested: either fixed, or chosen from the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySpec {
    Fixed(Key),
    Random,
}

impl KeySpec {
    /// Resolve to a concrete key. `Random` consumes exactly one draw.
    pub fn resolve(self, rng: &mut MusicRng) -> Key {
        match self {
            KeySpec::Fixed(key) => key,
            KeySpec::Random => {
                let n = rng.range_usize(0, 24);
                let mode = if n < 12 { KeyMode::Minor } else { KeyMode::Major };
                Key::new(PitchClass::new(n as i32 % 12), mode)
            }
        }
    }

    /// Resolve without randomness, for listings. `Random` lists in C minor.
    pub fn or_c_minor(self) -> Key {
        match self {
            KeySpec::Fixed(key) => key,
            KeySpec::Random => Key::c_minor(),
        }
    }
}

impl FromStr for KeySpec {
    type Err = ValidationError;

    /// Parses `Cmin`, `F#maj`, `Bbmin`, `random`. A bare note is minor.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("random") {
            return Ok(KeySpec::Random);
        }
        let (tonic, rest) =
            parse_note_prefix(trimmed).ok_or_else(|| ValidationError::unknown("key", s))?;
        let mode = match rest.to_ascii_lowercase().as_str() {
            "" | "min" | "minor" | "m" => KeyMode::Minor,
            "maj" | "major" => KeyMode::Major,
            _ => return Err(ValidationError::unknown("key", s)),
        };
        Ok(KeySpec::Fixed(Key::new(tonic, mode)))
    }
}

/// MIDI note number of `offset` semitones above `root` in `octave`
/// (scientific pitch notation: C4 = 60). May exceed 127 for extreme
/// octaves; the codec rejects such notes.
pub fn midi_note(root: PitchClass, offset: i32, octave: u8) -> i32 {
    12 * (octave as i32 + 1) + root.value() as i32 + offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_names() {
        let expected = [
            ("C", 0), ("C#", 1), ("Db", 1), ("D", 2), ("Eb", 3), ("E", 4),
            ("F", 5), ("f#", 6), ("G", 7), ("Ab", 8), ("A", 9), ("Bb", 10),
            ("B", 11),
        ];
        for (name, pc) in expected {
            assert_eq!(name.parse::<PitchClass>().unwrap().value(), pc, "{name}");
        }
        assert!("H".parse::<PitchClass>().is_err());
        assert!("C##".parse::<PitchClass>().is_err());
        assert!("".parse::<PitchClass>().is_err());
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(
            "Cmin".parse::<KeySpec>().unwrap(),
            KeySpec::Fixed(Key::new(PitchClass::new(0), KeyMode::Minor))
        );
        assert_eq!(
            "F#maj".parse::<KeySpec>().unwrap(),
            KeySpec::Fixed(Key::new(PitchClass::new(6), KeyMode::Major))
        );
        assert_eq!(
            "Bbmin".parse::<KeySpec>().unwrap(),
            KeySpec::Fixed(Key::new(PitchClass::new(10), KeyMode::Minor))
        );
        assert_eq!("random".parse::<KeySpec>().unwrap(), KeySpec::Random);
        assert!("Xmaj".parse::<KeySpec>().is_err());
        assert!("Cdorian".parse::<KeySpec>().is_err());
    }

    #[test]
    fn test_scale_root_of_major_is_relative_minor() {
        let c_major = Key::new(PitchClass::C, KeyMode::Major);
        assert_eq!(c_major.scale_root(), PitchClass::new(9));
        let d_minor = Key::new(PitchClass::new(2), KeyMode::Minor);
        assert_eq!(d_minor.scale_root(), PitchClass::new(2));
    }

    #[test]
    fn test_random_key_is_deterministic_per_seed() {
        let a = KeySpec::Random.resolve(&mut MusicRng::new(7));
        let b = KeySpec::Random.resolve(&mut MusicRng::new(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_display_round_trips() {
        for name in ["Cmin", "G#maj", "Amin"] {
            let KeySpec::Fixed(key) = name.parse::<KeySpec>().unwrap() else {
                panic!("{name} should be a fixed key");
            };
            assert_eq!(key.to_string(), name);
        }
    }

    #[test]
    fn test_midi_note() {
        assert_eq!(midi_note(PitchClass::C, 0, 4), 60);
        assert_eq!(midi_note(PitchClass::new(9), 0, 4), 69);
        assert_eq!(midi_note(PitchClass::C, 19, 4), 79);
    }
}
