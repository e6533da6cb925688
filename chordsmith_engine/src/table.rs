// Twelve-column chord table.
//
// The filtered vocabulary is flattened into a `ChordList` (deduplicated,
// first-seen order) and each entry is then placed into one or more of 12
// columns, one per pitch class, under a `TableScheme`:
// - `contains_note`: a chord appears in the column of every pitch class it
//   sounds (fan-out).
// - `highest_note` / `lowest_note`: a chord appears once, in the column of
//   the top / bottom tone of its voicing.
//
// Columns store indices into the list rather than clones, so a chord placed
// in four columns is still one chord for probability and uniqueness. Tables
// are immutable once built; the engine may share them through the cache.

use crate::error::ValidationError;
use crate::pitch::PitchClass;
use crate::vocabulary::ChordInstance;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule assigning a chord to columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableScheme {
    #[default]
    ContainsNote,
    HighestNote,
    LowestNote,
}

impl TableScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            TableScheme::ContainsNote => "contains_note",
            TableScheme::HighestNote => "highest_note",
            TableScheme::LowestNote => "lowest_note",
        }
    }

    /// The columns `chord` belongs to under this scheme.
    fn columns_of(self, chord: &ChordInstance) -> Vec<PitchClass> {
        match self {
            TableScheme::ContainsNote => chord.pitch_classes(),
            TableScheme::HighestNote => chord.highest_note().into_iter().collect(),
            TableScheme::LowestNote => chord.lowest_note().into_iter().collect(),
        }
    }
}

impl fmt::Display for TableScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableScheme {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "contains_note" | "contains" => Ok(TableScheme::ContainsNote),
            "highest_note" | "highest" => Ok(TableScheme::HighestNote),
            "lowest_note" | "lowest" => Ok(TableScheme::LowestNote),
            _ => Err(ValidationError::unknown("table scheme", s)),
        }
    }
}

/// A chord list together with its 12 columns of indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTable {
    pub scheme: TableScheme,
    chords: Vec<ChordInstance>,
    columns: [Vec<usize>; 12],
}

impl ChordTable {
    /// Arrange `vocabulary` under `scheme`. Duplicates are dropped, first
    /// seen wins; column order follows list order.
    pub fn arrange(vocabulary: Vec<ChordInstance>, scheme: TableScheme) -> Self {
        let mut chords: Vec<ChordInstance> = Vec::with_capacity(vocabulary.len());
        for chord in vocabulary {
            if !chords.contains(&chord) {
                chords.push(chord);
            }
        }
        let mut columns: [Vec<usize>; 12] = Default::default();
        for (i, chord) in chords.iter().enumerate() {
            for pc in scheme.columns_of(chord) {
                columns[pc.index()].push(i);
            }
        }
        log::debug!(
            "Arranged {} chords under {scheme} ({} non-empty columns)",
            chords.len(),
            columns.iter().filter(|c| !c.is_empty()).count()
        );
        ChordTable {
            scheme,
            chords,
            columns,
        }
    }

    /// The flat chord list.
    pub fn chords(&self) -> &[ChordInstance] {
        &self.chords
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// Indices into `chords()` for the column of `pc`.
    pub fn column(&self, pc: PitchClass) -> &[usize] {
        &self.columns[pc.index()]
    }

    pub fn columns(&self) -> &[Vec<usize>; 12] {
        &self.columns
    }

    /// Pitch classes whose column is non-empty, ascending.
    pub fn non_empty_columns(&self) -> Vec<PitchClass> {
        PitchClass::all()
            .filter(|pc| !self.columns[pc.index()].is_empty())
            .collect()
    }

    /// A new table holding only the chords that sound every pitch class in
    /// `targets`, arranged under the same scheme.
    pub fn containing_all(&self, targets: &[PitchClass]) -> ChordTable {
        let kept: Vec<ChordInstance> = self
            .chords
            .iter()
            .filter(|chord| targets.iter().all(|&pc| chord.contains(pc)))
            .cloned()
            .collect();
        ChordTable::arrange(kept, self.scheme)
    }
}
