// Seed material and the request RNG.
//
// Caller input (uploaded file bytes, text, and an optional "vibe" tag) is
// never interpreted; its SHA-256 digest becomes the 256-bit state of the
// request's `MusicRng`. Identical input therefore replays identical choices.
//
// With `randomize` set, 32 bytes of OS entropy are XORed into the digest
// before seeding. The output is intentionally not reproducible; this is the
// only place the engine touches a non-deterministic source.

use crate::error::ValidationError;
use chordsmith_prng::MusicRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// The raw bytes a request is seeded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedInput {
    pub file: Vec<u8>,
    pub text: String,
    /// Appended after the text; does not count as input on its own.
    pub vibe: String,
}

impl SeedInput {
    pub fn new(file: impl Into<Vec<u8>>, text: impl Into<String>) -> Self {
        SeedInput {
            file: file.into(),
            text: text.into(),
            vibe: String::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        SeedInput::new(Vec::new(), text)
    }

    pub fn with_vibe(mut self, vibe: impl Into<String>) -> Self {
        self.vibe = vibe.into();
        self
    }

    /// Reject input with neither file content nor text.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.file.is_empty() && self.text.is_empty() {
            return Err(ValidationError::NoInput);
        }
        Ok(())
    }

    /// SHA-256 of file ++ text ++ vibe.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.file);
        hasher.update(self.text.as_bytes());
        hasher.update(self.vibe.as_bytes());
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }
}

/// Build the request RNG from `input`.
pub fn request_rng(input: &SeedInput, randomize: bool) -> Result<MusicRng, ValidationError> {
    input.validate()?;
    let mut seed = input.digest();
    if randomize {
        let mut entropy = [0u8; 32];
        rand::rng().fill_bytes(&mut entropy);
        for (s, e) in seed.iter_mut().zip(entropy) {
            *s ^= e;
        }
        log::debug!("Randomized request: output will not be reproducible");
    }
    Ok(MusicRng::from_seed_bytes(seed))
}
