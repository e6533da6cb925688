// Read-through cache of built chord tables.
//
// A table is a pure function of (group selection, scale, scale root, table
// scheme), so it can be reused across requests that share those inputs. The
// key is the scale root rather than the key itself: C major and A minor
// build the same table. Entries are immutable `Arc`s; a request holds its
// table for its whole duration and nothing evicts or mutates it mid-request.

use crate::pitch::{Key, PitchClass};
use crate::scale::{Scale, filter_vocabulary};
use crate::table::{ChordTable, TableScheme};
use crate::vocabulary::{GroupSelection, build_vocabulary};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableKey {
    selection: GroupSelection,
    scale: Scale,
    scale_root: PitchClass,
    scheme: TableScheme,
}

/// Build a table from scratch: vocabulary, scale filter, arrangement.
pub fn build_table(selection: &GroupSelection, key: Key, scale: Scale, scheme: TableScheme) -> ChordTable {
    let vocabulary = build_vocabulary(selection, key);
    let filtered = filter_vocabulary(vocabulary, scale, key);
    ChordTable::arrange(filtered, scheme)
}

/// Tables built so far, keyed by everything they depend on.
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<TableKey, Arc<ChordTable>>,
    hits: u64,
    misses: u64,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for these inputs, building it on a miss.
    pub fn get_or_build(
        &mut self,
        selection: &GroupSelection,
        key: Key,
        scale: Scale,
        scheme: TableScheme,
    ) -> Arc<ChordTable> {
        let table_key = TableKey {
            selection: selection.clone(),
            scale,
            scale_root: key.scale_root(),
            scheme,
        };
        if let Some(table) = self.tables.get(&table_key) {
            self.hits += 1;
            return Arc::clone(table);
        }
        self.misses += 1;
        let table = Arc::new(build_table(selection, key, scale, scheme));
        self.tables.insert(table_key, Arc::clone(&table));
        table
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
