// Error taxonomy for the generation engine.
//
// Two failure classes reach the caller:
// - `ValidationError`: the request itself is unusable (no seed input, a
//   custom chord group with nothing selected, an unknown option name, a
//   timeline longer than a MIDI file can address).
//   Raised before any computation.
// - `EncodingError`: an internal invariant broke while writing the MIDI file
//   (a pitch or velocity outside 0-127, a tick past the 28-bit delta limit).
//   Fatal for the request.
//
// An empty vocabulary after pruning is NOT an error; it flows through as an
// empty table/list (or an empty track). Uniqueness relaxation is likewise a
// logged policy outcome, see `picker.rs`.

use thiserror::Error;

/// Top-level error returned by the engine's boundary operations.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The request was rejected before anything was computed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no input provided: both the file content and the text are empty")]
    NoInput,
    #[error("a custom chord group was selected but no chord types were chosen")]
    EmptyCustomSelection,
    #[error("unknown {kind} '{value}'")]
    Unknown { kind: &'static str, value: String },
    #[error("'{0}' is not a note name")]
    InvalidNote(String),
    #[error("chord duration must be a positive number of beats, got {0}")]
    InvalidDuration(String),
    #[error("sequence would end at tick {ticks}, past the MIDI limit of {limit}")]
    TimelineTooLong { ticks: u64, limit: u64 },
}

impl ValidationError {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        ValidationError::Unknown {
            kind,
            value: value.to_string(),
        }
    }
}

/// A sequence could not be serialized.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("pitch {0} is outside the MIDI range 0-127")]
    PitchOutOfRange(i32),
    #[error("velocity {0} is outside the MIDI range 0-127")]
    VelocityOutOfRange(u8),
    #[error("tick {0} exceeds the largest representable delta time")]
    TickOutOfRange(u64),
    #[error("ticks per quarter note {0} does not fit the 15-bit header field")]
    InvalidTimebase(u16),
    #[error("I/O error while writing MIDI: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MusicError>;
