// Placement of picked chords onto a timeline.
//
// The composer walks the picked chords slot by slot. Each slot starts where
// the previous one ended and is filled by a `PlacementStrategy`:
//
// - `chords`: one block chord per slot. Optional tones sound with the
//   configured chance.
// - `melody`: a monophonic line of random lengths (half-beat steps up to a
//   whole bar) that fit the slot, each a random chord tone.
// - `melody-v2`: an eighth-note up-and-down arpeggio over the chord tones.
//   High roots drop an octave so the line stays in one register.
// - `melody-v3`: quarter notes moving to the chord tone nearest the previous
//   note. A leap wider than a whole tone is split by an in-scale passing
//   tone, each half an eighth note.
// - `intended`: slot lengths come from caller beat hints instead of the
//   fixed grid. Chords get random octave inversions and every voice
//   re-articulates with its own rhythm and humanized velocity.
//
// Strategies consume RNG draws only inside `place`, in slot order, which
// keeps placement reproducible for a fixed stream.

use crate::config::GeneratorConfig;
use crate::error::ValidationError;
use crate::pitch::midi_note;
use crate::scale::ScaleInstance;
use crate::vocabulary::ChordInstance;
use chordsmith_prng::MusicRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One sounding note in absolute ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoteEvent {
    /// MIDI note number. Signed so out-of-range values reach the codec,
    /// which rejects them.
    pub pitch: i32,
    pub velocity: u8,
    pub start: u32,
    pub duration: u32,
}

/// Which chord filled a slot and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordSlot {
    pub chord: String,
    pub start: u32,
    pub length: u32,
}

/// Timed events produced by one placement strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sequence {
    pub name: String,
    pub slots: Vec<ChordSlot>,
    pub notes: Vec<NoteEvent>,
}

impl Sequence {
    /// Tick at which the last note ends.
    pub fn end_tick(&self) -> u32 {
        self.notes
            .iter()
            .map(|n| n.start + n.duration)
            .max()
            .unwrap_or(0)
    }
}

/// Placement mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementMode {
    Chords,
    Melody,
    MelodyV2,
    MelodyV3,
    Intended,
}

impl PlacementMode {
    pub const ALL: [PlacementMode; 5] = [
        PlacementMode::Chords,
        PlacementMode::Melody,
        PlacementMode::MelodyV2,
        PlacementMode::MelodyV3,
        PlacementMode::Intended,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlacementMode::Chords => "chords",
            PlacementMode::Melody => "melody",
            PlacementMode::MelodyV2 => "melody-v2",
            PlacementMode::MelodyV3 => "melody-v3",
            PlacementMode::Intended => "intended",
        }
    }

    /// Instantiate the strategy for this mode.
    pub fn strategy(self, config: &GeneratorConfig, rhythm: &[f64]) -> Box<dyn PlacementStrategy> {
        match self {
            PlacementMode::Chords => Box::new(BlockChords),
            PlacementMode::Melody => Box::new(RandomRhythmMelody),
            PlacementMode::MelodyV2 => Box::new(Arpeggio),
            PlacementMode::MelodyV3 => Box::new(VoiceLeading { previous: None }),
            PlacementMode::Intended => Box::new(IntendedPlacement {
                slots: rhythm_ticks(config, rhythm),
            }),
        }
    }

    /// Tick at which `slots` slots placed in this mode end.
    pub fn timeline_ticks(
        self,
        config: &GeneratorConfig,
        slot_ticks: u32,
        rhythm: &[f64],
        slots: usize,
    ) -> u64 {
        let hints = match self {
            PlacementMode::Intended => rhythm_ticks(config, rhythm),
            _ => Vec::new(),
        };
        if hints.is_empty() {
            return (slots as u64).saturating_mul(slot_ticks as u64);
        }
        let cycle: u64 = hints.iter().map(|&t| t as u64).sum();
        let partial: u64 = hints[..slots % hints.len()].iter().map(|&t| t as u64).sum();
        ((slots / hints.len()) as u64)
            .saturating_mul(cycle)
            .saturating_add(partial)
    }
}

/// Slot lengths in ticks from beat hints. Non-positive hints are skipped.
fn rhythm_ticks(config: &GeneratorConfig, rhythm: &[f64]) -> Vec<u32> {
    rhythm
        .iter()
        .filter(|&&beats| beats > 0.0)
        .map(|&beats| config.beats_to_ticks(beats).max(1))
        .collect()
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "chords" | "chord" => Ok(PlacementMode::Chords),
            "melody" => Ok(PlacementMode::Melody),
            "melody-v2" => Ok(PlacementMode::MelodyV2),
            "melody-v3" => Ok(PlacementMode::MelodyV3),
            "intended" | "intended-placement" => Ok(PlacementMode::Intended),
            _ => Err(ValidationError::unknown("mode", s)),
        }
    }
}

/// Read-only inputs shared by every slot.
pub struct PlacementContext<'a> {
    pub config: &'a GeneratorConfig,
    pub scale: ScaleInstance,
    /// Slot length on the fixed grid.
    pub slot_ticks: u32,
}

/// A way of turning one chord into timed notes.
pub trait PlacementStrategy {
    /// Length of slot `index` in ticks. Fixed-grid strategies use the
    /// context's slot length.
    fn slot_ticks(&self, ctx: &PlacementContext<'_>, _index: usize) -> u32 {
        ctx.slot_ticks
    }

    /// Emit notes for `chord` in `[start, start + length)`.
    fn place(
        &mut self,
        ctx: &PlacementContext<'_>,
        chord: &ChordInstance,
        start: u32,
        length: u32,
        rng: &mut MusicRng,
        out: &mut Vec<NoteEvent>,
    );
}

/// Distinct chord-tone pitch classes as offsets 0-11 above the root,
/// ascending.
fn compact_offsets(chord: &ChordInstance) -> Vec<i32> {
    let mut offsets: Vec<i32> = chord.required_offsets().map(|o| (o % 12) as i32).collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

struct BlockChords;

impl PlacementStrategy for BlockChords {
    fn place(
        &mut self,
        ctx: &PlacementContext<'_>,
        chord: &ChordInstance,
        start: u32,
        length: u32,
        rng: &mut MusicRng,
        out: &mut Vec<NoteEvent>,
    ) {
        let config = ctx.config;
        for tone in &chord.tones {
            if tone.optional && !rng.random_bool(config.optional_note_chance) {
                continue;
            }
            out.push(NoteEvent {
                pitch: midi_note(chord.root, tone.offset as i32, config.chord_octave),
                velocity: config.default_velocity,
                start,
                duration: length,
            });
        }
    }
}

struct RandomRhythmMelody;

impl PlacementStrategy for RandomRhythmMelody {
    fn place(
        &mut self,
        ctx: &PlacementContext<'_>,
        chord: &ChordInstance,
        start: u32,
        length: u32,
        rng: &mut MusicRng,
        out: &mut Vec<NoteEvent>,
    ) {
        let config = ctx.config;
        let half_beat = config.beats_to_ticks(0.5).max(1);
        let offsets = compact_offsets(chord);
        let end = start.saturating_add(length);
        let mut t = start;
        while end - t >= half_beat {
            let fitting: Vec<u32> = (1..=8)
                .map(|k| k * half_beat)
                .filter(|&d| d <= end - t)
                .collect();
            let (Some(&duration), Some(&offset)) = (rng.choose(&fitting), rng.choose(&offsets))
            else {
                break;
            };
            out.push(NoteEvent {
                pitch: midi_note(chord.root, offset, config.melody_octave),
                velocity: config.default_velocity,
                start: t,
                duration,
            });
            t += duration;
        }
    }
}

struct Arpeggio;

impl PlacementStrategy for Arpeggio {
    fn place(
        &mut self,
        ctx: &PlacementContext<'_>,
        chord: &ChordInstance,
        start: u32,
        length: u32,
        _rng: &mut MusicRng,
        out: &mut Vec<NoteEvent>,
    ) {
        let config = ctx.config;
        let eighth = config.beats_to_ticks(0.5).max(1);
        let octave = if chord.root.value() >= 7 {
            config.melody_octave.saturating_sub(1)
        } else {
            config.melody_octave
        };
        let up = compact_offsets(chord);
        // Up then back down without repeating the turning points.
        let mut cycle = up.clone();
        if up.len() > 2 {
            cycle.extend(up[1..up.len() - 1].iter().rev());
        }
        if cycle.is_empty() {
            return;
        }
        let end = start.saturating_add(length);
        let mut t = start;
        let mut step = 0;
        while t < end {
            let duration = eighth.min(end - t);
            out.push(NoteEvent {
                pitch: midi_note(chord.root, cycle[step % cycle.len()], octave),
                velocity: config.default_velocity,
                start: t,
                duration,
            });
            t += duration;
            step += 1;
        }
    }
}

struct VoiceLeading {
    previous: Option<i32>,
}

impl VoiceLeading {
    /// Chord tones across the melody octave and its neighbors.
    fn candidates(chord: &ChordInstance, octave: u8) -> Vec<i32> {
        let offsets = compact_offsets(chord);
        let mut pitches = Vec::with_capacity(offsets.len() * 3);
        for o in [octave.saturating_sub(1), octave, octave.saturating_add(1)] {
            for &offset in &offsets {
                pitches.push(midi_note(chord.root, offset, o));
            }
        }
        pitches.sort_unstable();
        pitches.dedup();
        pitches
    }

    /// The candidate nearest `previous` other than `previous` itself; a tie
    /// between one above and one below is broken by a coin flip.
    fn next_pitch(candidates: &[i32], previous: i32, rng: &mut MusicRng) -> Option<i32> {
        let moving: Vec<i32> = candidates.iter().copied().filter(|&p| p != previous).collect();
        let best = moving.iter().map(|p| (p - previous).abs()).min()?;
        let nearest: Vec<i32> = moving
            .into_iter()
            .filter(|p| (p - previous).abs() == best)
            .collect();
        if nearest.len() > 1 && rng.random_bool(0.5) {
            nearest.last().copied()
        } else {
            nearest.first().copied()
        }
    }
}

impl PlacementStrategy for VoiceLeading {
    fn place(
        &mut self,
        ctx: &PlacementContext<'_>,
        chord: &ChordInstance,
        start: u32,
        length: u32,
        rng: &mut MusicRng,
        out: &mut Vec<NoteEvent>,
    ) {
        let config = ctx.config;
        let quarter = config.beats_to_ticks(1.0).max(1);
        let candidates = Self::candidates(chord, config.melody_octave);
        let end = start.saturating_add(length);
        let mut t = start;
        while t < end {
            let duration = quarter.min(end - t);
            let target = match self.previous {
                None => {
                    let middle = &candidates[candidates.len() / 3..(2 * candidates.len()).div_ceil(3)];
                    rng.choose(middle).copied()
                }
                Some(previous) => Self::next_pitch(&candidates, previous, rng),
            };
            let Some(target) = target else {
                break;
            };
            let passing = self
                .previous
                .filter(|p| (target - p).abs() > 2)
                .and_then(|p| ctx.scale.passing_tone(p, target));
            match passing {
                Some(passing) if duration >= 2 => {
                    let first = duration / 2;
                    out.push(NoteEvent {
                        pitch: passing,
                        velocity: config.default_velocity,
                        start: t,
                        duration: first,
                    });
                    out.push(NoteEvent {
                        pitch: target,
                        velocity: config.default_velocity,
                        start: t + first,
                        duration: duration - first,
                    });
                }
                _ => out.push(NoteEvent {
                    pitch: target,
                    velocity: config.default_velocity,
                    start: t,
                    duration,
                }),
            }
            self.previous = Some(target);
            t += duration;
        }
    }
}

struct IntendedPlacement {
    /// Slot lengths in ticks, cycled. Empty means the fixed grid.
    slots: Vec<u32>,
}

impl PlacementStrategy for IntendedPlacement {
    fn slot_ticks(&self, ctx: &PlacementContext<'_>, index: usize) -> u32 {
        if self.slots.is_empty() {
            return ctx.slot_ticks;
        }
        self.slots[index % self.slots.len()]
    }

    fn place(
        &mut self,
        ctx: &PlacementContext<'_>,
        chord: &ChordInstance,
        start: u32,
        length: u32,
        rng: &mut MusicRng,
        out: &mut Vec<NoteEvent>,
    ) {
        let config = ctx.config;
        let (vel_low, vel_high) = config.velocity_range();
        let half_beat = config.beats_to_ticks(0.5).max(1);
        let end = start.saturating_add(length);

        for offset in chord.required_offsets() {
            let mut pitch = midi_note(chord.root, offset as i32, config.chord_octave);
            if rng.random_bool(0.5) {
                pitch += if rng.random_bool(0.5) { 12 } else { -12 };
            }
            let mut t = start;
            while t < end {
                let steps = rng.range_u64(1, 5) as u32;
                let duration = (steps * half_beat).min(end - t);
                out.push(NoteEvent {
                    pitch,
                    velocity: rng.range_u8_inclusive(vel_low, vel_high),
                    start: t,
                    duration,
                });
                t += duration;
            }
        }
    }
}

/// Lays chords out slot by slot with one strategy.
pub struct SequenceComposer<'a> {
    ctx: PlacementContext<'a>,
    strategy: Box<dyn PlacementStrategy>,
    cursor: u32,
    sequence: Sequence,
}

impl<'a> SequenceComposer<'a> {
    pub fn new(ctx: PlacementContext<'a>, mode: PlacementMode, rhythm: &[f64]) -> Self {
        let strategy = mode.strategy(ctx.config, rhythm);
        SequenceComposer {
            ctx,
            strategy,
            cursor: 0,
            sequence: Sequence {
                name: mode.as_str().to_string(),
                ..Sequence::default()
            },
        }
    }

    /// Place `chord` in the next slot.
    pub fn place(&mut self, chord: &ChordInstance, rng: &mut MusicRng) {
        let index = self.sequence.slots.len();
        let length = self.strategy.slot_ticks(&self.ctx, index);
        let start = self.cursor;
        self.strategy
            .place(&self.ctx, chord, start, length, rng, &mut self.sequence.notes);
        self.sequence.slots.push(ChordSlot {
            chord: chord.name.clone(),
            start,
            length,
        });
        self.cursor = start.saturating_add(length);
    }

    pub fn finish(self) -> Sequence {
        log::debug!(
            "Composed {} slots, {} notes in {} mode",
            self.sequence.slots.len(),
            self.sequence.notes.len(),
            self.sequence.name
        );
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::{Key, PitchClass};
    use crate::scale::Scale;
    use crate::vocabulary::definition;

    fn ctx(config: &GeneratorConfig) -> PlacementContext<'_> {
        PlacementContext {
            config,
            scale: ScaleInstance::new(Scale::Natural, Key::c_minor()),
            slot_ticks: config.bar_ticks(),
        }
    }

    fn chord(id: &str, root: i32) -> ChordInstance {
        ChordInstance::new(definition(id).unwrap(), PitchClass::new(root))
    }

    fn compose(mode: PlacementMode, chords: &[ChordInstance], seed: u64) -> Sequence {
        let config = GeneratorConfig::default();
        let mut composer = SequenceComposer::new(ctx(&config), mode, &[]);
        let mut rng = MusicRng::new(seed);
        for c in chords {
            composer.place(c, &mut rng);
        }
        composer.finish()
    }

    #[test]
    fn test_parse_modes_and_aliases() {
        for (s, mode) in [
            ("chords", PlacementMode::Chords),
            ("melody v2", PlacementMode::MelodyV2),
            ("melody_v3", PlacementMode::MelodyV3),
            ("intended-placement", PlacementMode::Intended),
            ("intended_placement", PlacementMode::Intended),
        ] {
            assert_eq!(s.parse::<PlacementMode>().unwrap(), mode, "{s}");
        }
        assert!("polka".parse::<PlacementMode>().is_err());
    }

    #[test]
    fn test_block_chord_fills_one_bar() {
        let seq = compose(PlacementMode::Chords, &[chord("minor", 0)], 1);
        let pitches: Vec<i32> = seq.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 63, 67]);
        assert!(seq.notes.iter().all(|n| n.start == 0 && n.duration == 384));
        assert_eq!(seq.slots.len(), 1);
    }

    #[test]
    fn test_melodies_are_monophonic_and_fit_slots() {
        let chords = [chord("minor", 0), chord("major", 8), chord("dominant7", 7)];
        for mode in [PlacementMode::Melody, PlacementMode::MelodyV2, PlacementMode::MelodyV3] {
            let seq = compose(mode, &chords, 3);
            let mut notes = seq.notes.clone();
            notes.sort_by_key(|n| n.start);
            for pair in notes.windows(2) {
                assert!(pair[0].start + pair[0].duration <= pair[1].start, "{mode} overlaps");
            }
            assert!(seq.end_tick() <= 3 * 384, "{mode} overruns");
        }
    }

    #[test]
    fn test_melody_uses_chord_tones() {
        let c = chord("minor", 0);
        for mode in [PlacementMode::Melody, PlacementMode::MelodyV2] {
            let seq = compose(mode, std::slice::from_ref(&c), 11);
            for note in &seq.notes {
                assert!(c.contains(PitchClass::new(note.pitch)), "{mode}: {}", note.pitch);
            }
        }
    }

    #[test]
    fn test_arpeggio_is_eighth_notes() {
        let seq = compose(PlacementMode::MelodyV2, &[chord("major", 0)], 0);
        assert_eq!(seq.notes.len(), 8);
        let pitches: Vec<i32> = seq.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![72, 76, 79, 76, 72, 76, 79, 76]);
    }

    #[test]
    fn test_variants_differ_for_same_chords() {
        let chords = [chord("minor7", 0), chord("major7", 3), chord("minor", 5), chord("dominant7", 7)];
        let a = compose(PlacementMode::Melody, &chords, 21);
        let b = compose(PlacementMode::MelodyV2, &chords, 21);
        let c = compose(PlacementMode::MelodyV3, &chords, 21);
        assert_ne!(a.notes, b.notes);
        assert_ne!(b.notes, c.notes);
        assert_ne!(a.notes, c.notes);
    }

    #[test]
    fn test_intended_follows_rhythm_hints() {
        let config = GeneratorConfig::default();
        let mut composer = SequenceComposer::new(ctx(&config), PlacementMode::Intended, &[2.0, 6.0]);
        let mut rng = MusicRng::new(4);
        for c in [chord("minor", 0), chord("major", 3), chord("minor", 5)] {
            composer.place(&c, &mut rng);
        }
        let seq = composer.finish();
        let starts: Vec<u32> = seq.slots.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 192, 768]);
        let (low, high) = config.velocity_range();
        assert!(seq.notes.iter().all(|n| (low..=high).contains(&n.velocity)));
    }

    #[test]
    fn test_placement_is_deterministic() {
        let chords = [chord("major9", 0), chord("augmented", 2)];
        for mode in PlacementMode::ALL {
            assert_eq!(compose(mode, &chords, 8), compose(mode, &chords, 8), "{mode}");
        }
    }

    #[test]
    fn test_timeline_ticks_matches_placement() {
        let config = GeneratorConfig::default();
        let rhythm = [2.0, 6.0, 1.0];
        let chords = [chord("minor", 0), chord("major", 3), chord("minor", 5), chord("major", 8)];
        for mode in PlacementMode::ALL {
            let mut composer = SequenceComposer::new(ctx(&config), mode, &rhythm);
            let mut rng = MusicRng::new(2);
            for c in &chords {
                composer.place(c, &mut rng);
            }
            let seq = composer.finish();
            let last = seq.slots.last().unwrap();
            let placed = last.start as u64 + last.length as u64;
            let expected = mode.timeline_ticks(&config, config.bar_ticks(), &rhythm, chords.len());
            assert_eq!(placed, expected, "{mode}");
        }
    }

    #[test]
    fn test_slot_at_end_of_tick_range_does_not_overflow() {
        let config = GeneratorConfig::default();
        let c = chord("major7", 0);
        let start = u32::MAX - 96;
        let mut strategies: Vec<Box<dyn PlacementStrategy>> = vec![
            Box::new(RandomRhythmMelody),
            Box::new(Arpeggio),
            Box::new(VoiceLeading { previous: None }),
            Box::new(IntendedPlacement { slots: Vec::new() }),
        ];
        for strategy in strategies.iter_mut() {
            let mut notes = Vec::new();
            strategy.place(&ctx(&config), &c, start, 1000, &mut MusicRng::new(6), &mut notes);
            assert!(!notes.is_empty());
            assert!(notes.iter().all(|n| n.start as u64 + n.duration as u64 <= u32::MAX as u64));
        }
    }
}
