// Standard MIDI File output.
//
// Converts composed `Sequence`s into an SMF byte buffer. One sequence is
// written as format 0 (single track); several are written as format 1, one
// track per sequence, named after its placement mode. Everything goes out on
// channel 0 with the configured timebase (96 ticks per quarter by default).
//
// Notes are flattened into note-on/note-off pairs at absolute ticks, then
// sorted by (tick, off-before-on, pitch) so a note ending where the next one
// starts on the same key is released before it is struck again. Delta times
// are differences of absolute ticks. Each track ends with End-of-Track.
//
// Range checks happen here, before any `midly` integer is built: pitches and
// velocities must fit 7 bits and ticks must fit the 28-bit delta field.
// A violation is an `EncodingError`, never a silently truncated value.
//
// Uses the `midly` crate for MIDI writing.

use crate::compose::{NoteEvent, Sequence};
use crate::config::GeneratorConfig;
use crate::error::EncodingError;
use crate::pitch::midi_note;
use crate::vocabulary::ChordInstance;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};

/// Largest tick representable in a 28-bit variable-length delta.
pub const MAX_TICK: u64 = (1 << 28) - 1;

/// Largest timebase the 15-bit metrical header field can carry.
const MAX_TICKS_PER_QUARTER: u16 = 0x7FFF;

/// A note-on or note-off at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RawEvent {
    tick: u32,
    /// 0 = note-off, 1 = note-on; sorts offs first at equal ticks.
    on: u8,
    key: u8,
    velocity: u8,
}

fn check_note(note: &NoteEvent) -> Result<(u8, u8), EncodingError> {
    let key = u8::try_from(note.pitch)
        .ok()
        .filter(|&p| p <= 127)
        .ok_or(EncodingError::PitchOutOfRange(note.pitch))?;
    if note.velocity > 127 {
        return Err(EncodingError::VelocityOutOfRange(note.velocity));
    }
    let end = note.start as u64 + note.duration as u64;
    if end > MAX_TICK {
        return Err(EncodingError::TickOutOfRange(end));
    }
    Ok((key, note.velocity))
}

/// Flatten notes into sorted raw events. Zero-length notes are dropped.
fn raw_events(notes: &[NoteEvent]) -> Result<Vec<RawEvent>, EncodingError> {
    let mut events = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let (key, velocity) = check_note(note)?;
        if note.duration == 0 {
            continue;
        }
        events.push(RawEvent {
            tick: note.start,
            on: 1,
            key,
            velocity,
        });
        events.push(RawEvent {
            tick: note.start + note.duration,
            on: 0,
            key,
            velocity: 0,
        });
    }
    events.sort();
    Ok(events)
}

fn end_of_track<'a>() -> TrackEvent<'a> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

/// Build one track. `header_events` (tempo, name) are placed at tick 0.
fn build_track<'a>(
    notes: &[NoteEvent],
    header_events: Vec<TrackEvent<'a>>,
) -> Result<Track<'a>, EncodingError> {
    let channel = u4::new(0);
    let mut track: Track<'a> = header_events;
    let mut last_tick: u32 = 0;
    for event in raw_events(notes)? {
        let message = if event.on == 1 {
            MidiMessage::NoteOn {
                key: u7::new(event.key),
                vel: u7::new(event.velocity),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(event.key),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(event.tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = event.tick;
    }
    track.push(end_of_track());
    Ok(track)
}

fn tempo_event<'a>(bpm: u16) -> TrackEvent<'a> {
    let micros_per_quarter = 60_000_000 / bpm.max(1) as u32;
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
    }
}

fn timing(config: &GeneratorConfig) -> Result<Timing, EncodingError> {
    let tpq = config.ticks_per_quarter;
    if tpq == 0 || tpq > MAX_TICKS_PER_QUARTER {
        return Err(EncodingError::InvalidTimebase(tpq));
    }
    Ok(Timing::Metrical(u15::new(tpq)))
}

fn write(smf: &Smf<'_>) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Encode sequences as an SMF: format 0 for one, format 1 for several.
pub fn encode_sequences(
    sequences: &[Sequence],
    config: &GeneratorConfig,
) -> Result<Vec<u8>, EncodingError> {
    let format = if sequences.len() > 1 {
        Format::Parallel
    } else {
        Format::SingleTrack
    };
    let mut smf = Smf::new(Header::new(format, timing(config)?));

    if sequences.is_empty() {
        let header = config.tempo_bpm.map(tempo_event).into_iter().collect();
        smf.tracks.push(build_track(&[], header)?);
    }
    for (i, sequence) in sequences.iter().enumerate() {
        let mut header = Vec::new();
        if i == 0 {
            header.extend(config.tempo_bpm.map(tempo_event));
        }
        if format == Format::Parallel {
            header.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(sequence.name.as_bytes())),
            });
        }
        smf.tracks.push(build_track(&sequence.notes, header)?);
    }
    write(&smf)
}

/// One-bar block chord of `chord`'s required tones: the listing preview.
pub fn chord_preview(chord: &ChordInstance, config: &GeneratorConfig) -> Result<Vec<u8>, EncodingError> {
    let notes: Vec<NoteEvent> = chord
        .required_offsets()
        .map(|offset| NoteEvent {
            pitch: midi_note(chord.root, offset as i32, config.chord_octave),
            velocity: config.default_velocity,
            start: 0,
            duration: config.bar_ticks(),
        })
        .collect();
    let sequence = Sequence {
        name: chord.name.clone(),
        notes,
        ..Sequence::default()
    };
    encode_sequences(std::slice::from_ref(&sequence), config)
}

/// Encode an explicit progression: each inner list is a set of MIDI note
/// numbers sounding together for one bar.
pub fn encode_progression(chords: &[Vec<i32>], config: &GeneratorConfig) -> Result<Vec<u8>, EncodingError> {
    let bar = config.bar_ticks();
    let mut notes = Vec::new();
    for (i, chord) in chords.iter().enumerate() {
        let start = u32::try_from(i as u64 * bar as u64)
            .map_err(|_| EncodingError::TickOutOfRange(i as u64 * bar as u64))?;
        for &pitch in chord {
            notes.push(NoteEvent {
                pitch,
                velocity: config.default_velocity,
                start,
                duration: bar,
            });
        }
    }
    let sequence = Sequence {
        name: "progression".to_string(),
        notes,
        ..Sequence::default()
    };
    encode_sequences(std::slice::from_ref(&sequence), config)
}
