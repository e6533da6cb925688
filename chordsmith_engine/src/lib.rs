// Chordsmith Chord & MIDI Generator
//
// Procedural chord-vocabulary and sequence generator. Caller input bytes
// (an uploaded file, some text, an optional "vibe" tag) are hashed into a
// seed that drives every choice; nothing about the input is interpreted.
// From a chord group, key and scale the engine builds a vocabulary, lays it
// out in a 12-column table, picks a chord sequence under a uniqueness
// window, places it on a timeline with one of several strategies, and
// writes a Standard MIDI File. Listing operations return the vocabulary as
// JSON with a base64 MIDI preview per chord.
//
// Architecture:
// - pitch.rs: Pitch classes, note-name parsing, keys and the minor-frame root
// - vocabulary.rs: Chord definition catalog, chord groups, chord instances
// - scale.rs: Scale tables, pruning and clone-on-optional expansion
// - table.rs: 12-column chord table under contains/highest/lowest schemes
// - probability.rs: 1D (list) and 2D (column) selection probabilities
// - seed.rs: SHA-256 seed material and the request RNG
// - pattern.rs: `1-2-1-3` slot pattern grammar
// - picker.rs: Chord picking with a uniqueness window and relaxation report
// - compose.rs: Placement strategies (chords, melody variants, intended)
// - midi.rs: SMF encoding, chord previews, explicit progressions
// - cache.rs: Read-through table cache
// - engine.rs: Request types, `Engine`, and the boundary operations
// - config.rs: Data-driven tunables (timebase, velocities, octaves, budgets)
// - error.rs: Validation and encoding error taxonomy
//
// With `randomize` off, output is a pure function of the request: identical
// requests produce byte-identical MIDI files.

pub mod cache;
pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod midi;
pub mod pattern;
pub mod picker;
pub mod pitch;
pub mod probability;
pub mod scale;
pub mod seed;
pub mod table;
pub mod vocabulary;

pub use compose::PlacementMode;
pub use config::GeneratorConfig;
pub use engine::{
    ChordListing, ChordQuery, ChordView, Composition, Engine, GenerationRequest, chord_finder,
    generate_midi, generate_midi_chord_progression, generate_midi_layers, get_chords_of_key,
};
pub use error::{EncodingError, MusicError, Result, ValidationError};
pub use picker::PickingMethod;
pub use pitch::{Key, KeySpec, PitchClass};
pub use scale::Scale;
pub use seed::SeedInput;
pub use table::TableScheme;
pub use vocabulary::ChordGroup;
