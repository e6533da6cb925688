// Chord picking with a uniqueness window.
//
// Two draw methods:
// - `original` (2D): choose one of the table's non-empty columns uniformly,
//   then a chord uniformly within it. Chords that fan out over many columns
//   are favored; see probability.rs.
// - `uniform` (1D): choose uniformly from the chord list.
//
// Uniqueness: the picker remembers its last `min_unique - 1` picks and
// rejects a candidate found there, so any `min_unique` consecutive picks are
// pairwise distinct. Rejected draws are retried up to `max_redraws` times,
// after which the pick is made uniformly among the allowed chords. When no
// chord is allowed (the window covers the whole vocabulary) the constraint is
// relaxed for that pick: the last draw is accepted, a warning is logged, and
// the pick report counts it.
//
// Every decision draws from the caller's `MusicRng`, so for a fixed RNG state
// and table the picks are a pure function of the inputs.

use crate::error::ValidationError;
use crate::pitch::PitchClass;
use crate::table::ChordTable;
use chordsmith_prng::MusicRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// How a single candidate is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickingMethod {
    /// Column first, then chord within the column.
    #[default]
    Original,
    /// Uniform over the chord list.
    Uniform,
}

impl fmt::Display for PickingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PickingMethod::Original => "original",
            PickingMethod::Uniform => "uniform",
        })
    }
}

impl FromStr for PickingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" | "2d" | "table" => Ok(PickingMethod::Original),
            "uniform" | "1d" | "list" => Ok(PickingMethod::Uniform),
            _ => Err(ValidationError::unknown("picking method", s)),
        }
    }
}

/// What happened while picking, for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickReport {
    /// Draws rejected by the uniqueness window.
    pub rejected: usize,
    /// Picks resolved by choosing among allowed chords after the redraw
    /// budget ran out.
    pub fallbacks: usize,
    /// Picks that had to repeat a chord inside the window.
    pub relaxed: usize,
}

/// Stateful picker over one table.
pub struct SequencePicker<'a> {
    table: &'a ChordTable,
    method: PickingMethod,
    columns: Vec<PitchClass>,
    window: usize,
    max_redraws: u32,
    history: VecDeque<usize>,
    report: PickReport,
}

impl<'a> SequencePicker<'a> {
    /// `min_unique` of 0 or 1 disables the uniqueness window.
    pub fn new(table: &'a ChordTable, method: PickingMethod, min_unique: usize, max_redraws: u32) -> Self {
        SequencePicker {
            table,
            method,
            columns: table.non_empty_columns(),
            window: min_unique.saturating_sub(1),
            max_redraws,
            history: VecDeque::new(),
            report: PickReport::default(),
        }
    }

    pub fn report(&self) -> &PickReport {
        &self.report
    }

    /// One unconstrained draw: an index into the table's chord list.
    fn draw(&self, rng: &mut MusicRng) -> Option<usize> {
        match self.method {
            PickingMethod::Uniform => {
                if self.table.is_empty() {
                    None
                } else {
                    Some(rng.range_usize(0, self.table.len()))
                }
            }
            PickingMethod::Original => {
                let pc = *rng.choose(&self.columns)?;
                rng.choose(self.table.column(pc)).copied()
            }
        }
    }

    /// Pick the next chord. `None` only for an empty table.
    pub fn pick(&mut self, rng: &mut MusicRng) -> Option<usize> {
        let mut candidate = self.draw(rng)?;
        if self.window > 0 {
            let mut accepted = !self.history.contains(&candidate);
            for _ in 0..self.max_redraws {
                if accepted {
                    break;
                }
                self.report.rejected += 1;
                candidate = self.draw(rng)?;
                accepted = !self.history.contains(&candidate);
            }
            if !accepted {
                let allowed: Vec<usize> = (0..self.table.len())
                    .filter(|i| !self.history.contains(i))
                    .collect();
                match rng.choose(&allowed) {
                    Some(&i) => {
                        self.report.fallbacks += 1;
                        candidate = i;
                    }
                    None => {
                        self.report.relaxed += 1;
                        log::warn!(
                            "Uniqueness window of {} exceeds the {} available chords; repeating {}",
                            self.window + 1,
                            self.table.len(),
                            self.table.chords()[candidate].name
                        );
                    }
                }
            }
            self.history.push_back(candidate);
            while self.history.len() > self.window {
                self.history.pop_front();
            }
        }
        Some(candidate)
    }

    /// Pick `n` chords in order.
    pub fn pick_many(&mut self, rng: &mut MusicRng, n: usize) -> Vec<usize> {
        (0..n).map_while(|_| self.pick(rng)).collect()
    }
}
