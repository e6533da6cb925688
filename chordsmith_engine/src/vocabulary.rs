// Chord vocabulary: definitions, groups, and realized instances.
//
// A `ChordDefinition` is an interval pattern (a voicing of semitone offsets
// above the root, each required or optional) with a stable id used for custom
// selection and a suffix used to name instances (`C` + `maj7` = `Cmaj7`).
// Voicings may span more than an octave; pitch-class membership is taken
// modulo 12 while the codec keeps the spread for playback.
//
// A `ChordInstance` is a definition realized at a root. The builder walks
// roots in ascending order and, per root, definitions in group order, so the
// vocabulary order is a pure function of (group, selection, key). That order
// is what deterministic picking indexes into.
//
// Group semantics:
// - `default`: common triads/sevenths at all 12 roots.
// - `original`: a hand-picked palette, each definition only at its curated
//   roots (semitones above the key's minor-frame root, see pitch.rs).
// - `custom`: the caller's selection at curated roots when defined.
// - `custom_pruning`: the caller's selection at all 12 roots; meant to be
//   combined with a pruning scale.
// An empty custom selection yields an empty vocabulary, not an error.

use crate::error::ValidationError;
use crate::pitch::{Key, NOTE_NAMES, PitchClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One tone of a chord voicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChordTone {
    /// Semitones above the root; may exceed 11.
    pub offset: u8,
    pub optional: bool,
}

const fn req(offset: u8) -> ChordTone {
    ChordTone {
        offset,
        optional: false,
    }
}

const fn opt(offset: u8) -> ChordTone {
    ChordTone {
        offset,
        optional: true,
    }
}

/// An immutable chord type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordDefinition {
    /// Stable identifier, e.g. `major7`.
    pub id: &'static str,
    /// Name suffix, e.g. `maj7`.
    pub suffix: &'static str,
    pub tones: &'static [ChordTone],
    /// Roots (semitones above the minor-frame root) used by the `original`
    /// and `custom` groups. Empty means every root.
    pub curated_roots: &'static [u8],
}

/// Every chord type the engine knows, in catalog order.
pub const CATALOG: &[ChordDefinition] = &[
    ChordDefinition { id: "major", suffix: "", tones: &[req(0), req(4), req(7)], curated_roots: &[3, 8, 10] },
    ChordDefinition { id: "minor", suffix: "m", tones: &[req(0), req(3), req(7)], curated_roots: &[0, 5, 7] },
    ChordDefinition { id: "diminished", suffix: "dim", tones: &[req(0), req(3), req(6)], curated_roots: &[3, 6] },
    ChordDefinition { id: "augmented", suffix: "aug", tones: &[req(0), req(4), req(8), opt(12)], curated_roots: &[2, 6, 10] },
    ChordDefinition { id: "sus2", suffix: "sus2", tones: &[req(0), req(2), req(7)], curated_roots: &[0, 3, 5, 7, 10] },
    ChordDefinition { id: "sus4", suffix: "sus4", tones: &[req(0), req(5), req(7)], curated_roots: &[0, 5, 7, 10] },
    ChordDefinition { id: "major6", suffix: "6", tones: &[req(0), req(9), req(16), req(19), opt(14)], curated_roots: &[3, 8, 10] },
    ChordDefinition { id: "minor6", suffix: "m6", tones: &[req(0), req(9), req(15), req(19)], curated_roots: &[0, 2, 5, 7] },
    ChordDefinition { id: "major7", suffix: "maj7", tones: &[req(0), req(11), req(16), req(19)], curated_roots: &[3, 8] },
    ChordDefinition { id: "minor7", suffix: "m7", tones: &[req(0), req(10), req(15), req(19)], curated_roots: &[0, 2, 5, 6, 10] },
    ChordDefinition { id: "dominant7", suffix: "7", tones: &[req(0), req(4), req(7), req(10)], curated_roots: &[7, 10] },
    ChordDefinition { id: "half_diminished7", suffix: "m7b5", tones: &[req(0), req(3), req(6), req(10)], curated_roots: &[2] },
    ChordDefinition { id: "diminished7", suffix: "dim7", tones: &[req(0), req(3), req(6), req(9)], curated_roots: &[11] },
    ChordDefinition { id: "major9", suffix: "maj9", tones: &[req(0), req(4), req(11), req(14), opt(7)], curated_roots: &[0, 5, 7] },
    ChordDefinition { id: "minor9", suffix: "m9", tones: &[req(0), req(3), req(10), req(14), opt(7)], curated_roots: &[0, 5] },
    ChordDefinition { id: "dominant9", suffix: "9", tones: &[req(0), req(4), req(10), req(14), opt(7)], curated_roots: &[7, 10] },
    ChordDefinition { id: "add9", suffix: "add9", tones: &[req(0), req(4), req(7), req(14)], curated_roots: &[3, 8, 10] },
    ChordDefinition { id: "major13", suffix: "maj13", tones: &[req(0), req(4), req(11), req(14), req(21), opt(7)], curated_roots: &[3, 8] },
    ChordDefinition { id: "major7sharp9", suffix: "7#9", tones: &[req(0), req(4), req(10), req(15)], curated_roots: &[0, 2, 7, 9] },
    ChordDefinition { id: "major7flat5sharp9", suffix: "7b5#9", tones: &[req(0), req(4), req(10), req(15), req(18)], curated_roots: &[0, 9] },
    ChordDefinition { id: "major9flat5", suffix: "9b5", tones: &[req(0), req(4), req(6), req(10), req(14)], curated_roots: &[0, 9] },
    ChordDefinition { id: "major7flat9", suffix: "7b9", tones: &[req(0), req(4), req(10), req(13)], curated_roots: &[0, 2] },
];

const DEFAULT_IDS: &[&str] = &[
    "major", "minor", "diminished", "augmented", "sus2", "sus4", "major7", "minor7", "dominant7",
    "major6", "minor6", "add9",
];

const ORIGINAL_IDS: &[&str] = &[
    "minor7",
    "major7",
    "diminished",
    "augmented",
    "major6",
    "minor6",
    "major9",
    "major7sharp9",
    "major7flat5sharp9",
    "major9flat5",
    "major7flat9",
];

/// Look up a catalog definition by id.
pub fn definition(id: &str) -> Option<&'static ChordDefinition> {
    CATALOG.iter().find(|d| d.id == id)
}

/// Named chord group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordGroup {
    Default,
    Original,
    Custom,
    CustomPruning,
}

impl ChordGroup {
    pub fn is_custom(self) -> bool {
        matches!(self, ChordGroup::Custom | ChordGroup::CustomPruning)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChordGroup::Default => "default",
            ChordGroup::Original => "original",
            ChordGroup::Custom => "custom",
            ChordGroup::CustomPruning => "custom_pruning",
        }
    }
}

impl fmt::Display for ChordGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChordGroup {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(ChordGroup::Default),
            "original" => Ok(ChordGroup::Original),
            "custom" => Ok(ChordGroup::Custom),
            "custom_pruning" | "custom-pruning" => Ok(ChordGroup::CustomPruning),
            _ => Err(ValidationError::unknown("chord group", s)),
        }
    }
}

/// A chord group together with the caller's custom selection (ignored for
/// built-in groups). Kept sorted so it can key the table cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupSelection {
    pub group: ChordGroup,
    pub custom: BTreeSet<String>,
    /// Realize every definition at all 12 roots, ignoring curated roots.
    /// Listings for a `random` key use this.
    pub all_roots: bool,
}

impl GroupSelection {
    pub fn new<I, S>(group: ChordGroup, custom: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupSelection {
            group,
            custom: custom.into_iter().map(Into::into).collect(),
            all_roots: false,
        }
    }

    pub fn builtin(group: ChordGroup) -> Self {
        GroupSelection {
            group,
            custom: BTreeSet::new(),
            all_roots: false,
        }
    }

    pub fn with_all_roots(mut self, all_roots: bool) -> Self {
        self.all_roots = all_roots;
        self
    }

    /// `true` when a custom group was chosen with nothing selected.
    pub fn is_empty_custom(&self) -> bool {
        self.group.is_custom() && self.custom.is_empty()
    }

    /// The definitions this selection realizes, in a stable order: group
    /// order for built-ins, catalog order for custom selections.
    pub fn definitions(&self) -> Vec<&'static ChordDefinition> {
        match self.group {
            ChordGroup::Default => DEFAULT_IDS.iter().filter_map(|id| definition(id)).collect(),
            ChordGroup::Original => ORIGINAL_IDS.iter().filter_map(|id| definition(id)).collect(),
            ChordGroup::Custom | ChordGroup::CustomPruning => {
                for id in &self.custom {
                    if definition(id).is_none() {
                        log::warn!("Ignoring unknown chord type '{id}' in custom selection");
                    }
                }
                CATALOG
                    .iter()
                    .filter(|d| self.custom.contains(d.id))
                    .collect()
            }
        }
    }

    /// Whether `def` is realized only at its curated roots.
    fn uses_curated_roots(&self, def: &ChordDefinition) -> bool {
        if self.all_roots {
            return false;
        }
        match self.group {
            ChordGroup::Original | ChordGroup::Custom => !def.curated_roots.is_empty(),
            ChordGroup::Default | ChordGroup::CustomPruning => false,
        }
    }
}

/// A chord definition realized at a specific root.
///
/// Identity is (root, definition, tones): two instances with equal fields
/// are the same chord for deduplication, table placement and uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChordInstance {
    pub name: String,
    pub chord_type: &'static str,
    pub root: PitchClass,
    /// Voicing in ascending offset order. Optional tones may still be
    /// present; the `all_notes` scale resolves them into variants.
    pub tones: Vec<ChordTone>,
}

impl ChordInstance {
    pub fn new(def: &ChordDefinition, root: PitchClass) -> Self {
        let mut tones = def.tones.to_vec();
        tones.sort();
        ChordInstance {
            name: format!("{}{}", root.name(), def.suffix),
            chord_type: def.id,
            root,
            tones,
        }
    }

    /// Offsets of the required tones, ascending.
    pub fn required_offsets(&self) -> impl Iterator<Item = u8> + '_ {
        self.tones.iter().filter(|t| !t.optional).map(|t| t.offset)
    }

    /// Offsets of the optional tones, ascending.
    pub fn optional_offsets(&self) -> impl Iterator<Item = u8> + '_ {
        self.tones.iter().filter(|t| t.optional).map(|t| t.offset)
    }

    /// Distinct pitch classes of the required tones, ascending by pitch class.
    pub fn pitch_classes(&self) -> Vec<PitchClass> {
        let set: BTreeSet<PitchClass> = self
            .required_offsets()
            .map(|o| self.root.transpose(o as i32))
            .collect();
        set.into_iter().collect()
    }

    /// True if every required pitch class is in `allowed` (indexed by pitch class).
    pub fn fits(&self, allowed: &[bool; 12]) -> bool {
        self.pitch_classes().iter().all(|pc| allowed[pc.index()])
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.pitch_classes().contains(&pc)
    }

    /// Pitch class of the lowest / highest sounding required tone.
    pub fn lowest_note(&self) -> Option<PitchClass> {
        self.required_offsets()
            .min()
            .map(|o| self.root.transpose(o as i32))
    }

    pub fn highest_note(&self) -> Option<PitchClass> {
        self.required_offsets()
            .max()
            .map(|o| self.root.transpose(o as i32))
    }

    /// Sharp-spelled names of the required tones in voicing order.
    pub fn note_names(&self) -> Vec<&'static str> {
        self.required_offsets()
            .map(|o| NOTE_NAMES[self.root.transpose(o as i32).index()])
            .collect()
    }
}

impl fmt::Display for ChordInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Expand a group selection into its unpruned vocabulary.
///
/// Roots ascend from 0 (C); curated roots are transposed to the key's
/// minor-frame root first. Duplicate identities are dropped, first seen wins.
pub fn build_vocabulary(selection: &GroupSelection, key: Key) -> Vec<ChordInstance> {
    if selection.is_empty_custom() {
        log::debug!("Custom chord group with empty selection: empty vocabulary");
        return Vec::new();
    }
    let definitions = selection.definitions();
    let scale_root = key.scale_root();

    let mut vocabulary = Vec::with_capacity(12 * definitions.len());
    for root in PitchClass::all() {
        for def in &definitions {
            if selection.uses_curated_roots(def) {
                let degree = root.interval_from(scale_root);
                if !def.curated_roots.contains(&degree) {
                    continue;
                }
            }
            let chord = ChordInstance::new(def, root);
            if !vocabulary.contains(&chord) {
                vocabulary.push(chord);
            }
        }
    }
    log::debug!(
        "Built vocabulary of {} chords for group {} in {}",
        vocabulary.len(),
        selection.group,
        key
    );
    vocabulary
}
