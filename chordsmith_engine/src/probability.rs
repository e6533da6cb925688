// Selection probabilities over a chord table.
//
// `probability_1d` is the chance of a chord under the uniform list picker:
// 1 / |list|. `probability_2d` is its chance under the column picker, which
// first chooses one of the F non-empty columns and then a chord within it:
// the sum, over every column holding the chord, of (1/F) * (1/|column|).
// With every column populated F is 12.
//
// The 2D figure only means something when chords fan out across every
// column they sound, so it is computed for `contains_note` tables only.

use crate::table::{ChordTable, TableScheme};
use serde::Serialize;

/// Probabilities of one chord, aligned with `ChordTable::chords()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChordProbability {
    pub probability_1d: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_2d: Option<f64>,
}

/// Compute probabilities for every chord in `table`, in list order.
pub fn probabilities(table: &ChordTable) -> Vec<ChordProbability> {
    let n = table.len();
    if n == 0 {
        return Vec::new();
    }
    let p1d = 1.0 / n as f64;

    let p2d: Option<Vec<f64>> = (table.scheme == TableScheme::ContainsNote).then(|| {
        let mut acc = vec![0.0; n];
        let filled = table.columns().iter().filter(|c| !c.is_empty()).count();
        for column in table.columns().iter().filter(|c| !c.is_empty()) {
            let share = 1.0 / (filled as f64 * column.len() as f64);
            for &i in column {
                acc[i] += share;
            }
        }
        acc
    });

    (0..n)
        .map(|i| ChordProbability {
            probability_1d: p1d,
            probability_2d: p2d.as_ref().map(|p| p[i]),
        })
        .collect()
}
