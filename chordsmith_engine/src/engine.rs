// Engine boundary: request types and the four public operations.
//
// Every operation runs the same forward pipeline:
//
//   vocabulary -> scale filter -> table -> (probabilities) -> picker
//     -> composer -> MIDI codec
//
// `Engine` owns the config and an optional `TableCache`. The free functions
// at the bottom run on a fresh, cache-less engine with the default config,
// so they are pure functions of their arguments.
//
// Per generation request the RNG is used in a fixed order: key resolution
// first, then picking and placement. With `use_same_chords` every pick is
// committed before any note is placed, so each placement mode sees the same
// chords for the same seed. Otherwise each slot picks immediately before it
// is placed, on the same stream.
//
// Listings (`get_chords_of_key`, `chord_finder`) never touch an RNG. A
// `random` key lists in C minor with every chord at all 12 roots.

use crate::cache::{TableCache, build_table};
use crate::compose::{PlacementContext, PlacementMode, Sequence, SequenceComposer};
use crate::config::GeneratorConfig;
use crate::error::{Result, ValidationError};
use crate::midi;
use crate::pattern::Pattern;
use crate::picker::{PickReport, PickingMethod, SequencePicker};
use crate::pitch::{Key, KeySpec, PitchClass};
use crate::probability::{ChordProbability, probabilities};
use crate::scale::{Scale, ScaleInstance};
use crate::seed::{SeedInput, request_rng};
use crate::table::{ChordTable, TableScheme};
use crate::vocabulary::{ChordGroup, ChordInstance, GroupSelection};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;
use std::sync::Arc;

/// Everything `generate_midi` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub seed: SeedInput,
    pub mode: PlacementMode,
    pub use_same_chords: bool,
    pub num_chords: usize,
    pub key: KeySpec,
    pub custom_chords: Vec<String>,
    pub chord_group: ChordGroup,
    pub picking_method: PickingMethod,
    pub min_unique_chords: usize,
    pub scale: Scale,
    pub randomize: bool,
    /// Slot pattern such as `1-2-1-3`; honoured in chords mode with
    /// `use_same_chords`.
    pub pattern: Option<String>,
    /// Slot length in beats; defaults to one bar.
    pub duration: Option<f64>,
    /// Beat hints for intended placement, cycled over the slots.
    pub rhythm: Vec<f64>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            seed: SeedInput::default(),
            mode: PlacementMode::Chords,
            use_same_chords: true,
            num_chords: 4,
            key: KeySpec::Fixed(Key::c_minor()),
            custom_chords: Vec::new(),
            chord_group: ChordGroup::Original,
            picking_method: PickingMethod::Original,
            min_unique_chords: 2,
            scale: Scale::Disabled,
            randomize: false,
            pattern: None,
            duration: None,
            rhythm: Vec::new(),
        }
    }
}

impl GenerationRequest {
    fn selection(&self) -> GroupSelection {
        GroupSelection::new(self.chord_group, self.custom_chords.iter().cloned())
    }

    /// Reject requests that cannot produce anything meaningful.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.seed.validate()?;
        if self.chord_group.is_custom() && self.custom_chords.is_empty() {
            return Err(ValidationError::EmptyCustomSelection);
        }
        let hints = self.duration.iter().chain(&self.rhythm);
        if let Some(beats) = hints.copied().find(|b| !(b.is_finite() && *b > 0.0)) {
            return Err(ValidationError::InvalidDuration(beats.to_string()));
        }
        Ok(())
    }

    /// Fixed-grid slot length under `config`.
    fn slot_ticks(&self, config: &GeneratorConfig) -> u32 {
        config
            .beats_to_ticks(self.duration.unwrap_or(config.beats_per_bar as f64))
            .max(1)
    }

    /// Reject requests whose timeline in any of `modes` would end past the
    /// last tick a MIDI file can address.
    pub fn check_timeline(
        &self,
        config: &GeneratorConfig,
        modes: &[PlacementMode],
    ) -> std::result::Result<(), ValidationError> {
        let slot_ticks = self.slot_ticks(config);
        for &mode in modes {
            let ticks = mode.timeline_ticks(config, slot_ticks, &self.rhythm, self.num_chords);
            if ticks > midi::MAX_TICK {
                return Err(ValidationError::TimelineTooLong {
                    ticks,
                    limit: midi::MAX_TICK,
                });
            }
        }
        Ok(())
    }
}

/// Inputs shared by the two listing operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordQuery {
    pub key: KeySpec,
    pub custom_chords: Vec<String>,
    pub chord_group: ChordGroup,
    pub scale: Scale,
    pub table_scheme: TableScheme,
}

impl Default for ChordQuery {
    fn default() -> Self {
        ChordQuery {
            key: KeySpec::Fixed(Key::c_minor()),
            custom_chords: Vec::new(),
            chord_group: ChordGroup::Original,
            scale: Scale::Disabled,
            table_scheme: TableScheme::ContainsNote,
        }
    }
}

impl ChordQuery {
    fn selection(&self) -> GroupSelection {
        GroupSelection::new(self.chord_group, self.custom_chords.iter().cloned())
            .with_all_roots(self.key == KeySpec::Random)
    }
}

/// A chord as presented to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordView {
    pub name: String,
    pub chord_type: &'static str,
    pub root: &'static str,
    pub notes: Vec<&'static str>,
    /// Base64 of a one-bar preview MIDI file.
    pub midi: String,
    #[serde(flatten)]
    pub probability: Option<ChordProbability>,
}

/// Result of the listing operations: 12 columns plus the flat list, each
/// sorted by chord name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordListing {
    pub chord_list: Vec<ChordView>,
    pub chord_table: Vec<Vec<ChordView>>,
}

impl ChordListing {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A rendered request before encoding.
#[derive(Debug, Clone)]
pub struct Composition {
    pub key: Key,
    /// Names of the committed picks, in pick order. With a pattern these
    /// are the pattern's pick-set.
    pub picks: Vec<String>,
    pub sequences: Vec<Sequence>,
    pub report: PickReport,
}

/// The generation engine.
#[derive(Debug)]
pub struct Engine {
    config: GeneratorConfig,
    cache: Option<TableCache>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(GeneratorConfig::default())
    }
}

impl Engine {
    /// Engine with a table cache when the config enables one.
    pub fn new(config: GeneratorConfig) -> Self {
        let cache = config.cache_tables.then(TableCache::new);
        Engine { config, cache }
    }

    /// Engine that rebuilds every table.
    pub fn uncached(config: GeneratorConfig) -> Self {
        Engine {
            config,
            cache: None,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&TableCache> {
        self.cache.as_ref()
    }

    fn table(
        &mut self,
        selection: &GroupSelection,
        key: Key,
        scale: Scale,
        scheme: TableScheme,
    ) -> Arc<ChordTable> {
        match self.cache.as_mut() {
            Some(cache) => cache.get_or_build(selection, key, scale, scheme),
            None => Arc::new(build_table(selection, key, scale, scheme)),
        }
    }

    /// Pick and place chords for `request` in each of `modes`.
    ///
    /// Several modes always share one committed pick sequence.
    pub fn compose(&mut self, request: &GenerationRequest, modes: &[PlacementMode]) -> Result<Composition> {
        request.validate()?;
        request.check_timeline(&self.config, modes)?;
        let mut rng = request_rng(&request.seed, request.randomize)?;
        let key = request.key.resolve(&mut rng);
        let table = self.table(&request.selection(), key, request.scale, TableScheme::ContainsNote);
        if table.is_empty() {
            log::warn!(
                "No chords left for group {} with scale {} in {}; writing an empty track",
                request.chord_group,
                request.scale,
                key
            );
        }

        let config = &self.config;
        let slot_ticks = request.slot_ticks(config);
        let mut picker = SequencePicker::new(
            &table,
            request.picking_method,
            request.min_unique_chords,
            config.max_redraws,
        );
        let mut composers: Vec<SequenceComposer<'_>> = modes
            .iter()
            .map(|&mode| {
                let ctx = PlacementContext {
                    config,
                    scale: ScaleInstance::new(request.scale, key),
                    slot_ticks,
                };
                SequenceComposer::new(ctx, mode, &request.rhythm)
            })
            .collect();

        let pattern = Pattern::parse_lenient(request.pattern.as_deref());
        let pattern_applies = pattern.is_some() && request.use_same_chords && modes == [PlacementMode::Chords];
        if pattern.is_some() && !pattern_applies {
            log::warn!("Chord pattern only applies to chords mode with use_same_chords; ignoring it");
        }
        let same_chords = request.use_same_chords || modes.len() > 1;

        let picks: Vec<usize> = if same_chords {
            let (committed, slots): (Vec<usize>, Vec<usize>) = match pattern.filter(|_| pattern_applies) {
                Some(pattern) => {
                    let committed = picker.pick_many(&mut rng, pattern.pick_count());
                    let slots = if committed.is_empty() {
                        Vec::new()
                    } else {
                        (0..request.num_chords)
                            .map(|i| committed[pattern.pick_for_slot(i)])
                            .collect()
                    };
                    (committed, slots)
                }
                None => {
                    let committed = picker.pick_many(&mut rng, request.num_chords);
                    (committed.clone(), committed)
                }
            };
            for composer in composers.iter_mut() {
                for &i in &slots {
                    composer.place(&table.chords()[i], &mut rng);
                }
            }
            committed
        } else {
            let mut committed = Vec::with_capacity(request.num_chords);
            for _ in 0..request.num_chords {
                let Some(i) = picker.pick(&mut rng) else {
                    break;
                };
                for composer in composers.iter_mut() {
                    composer.place(&table.chords()[i], &mut rng);
                }
                committed.push(i);
            }
            committed
        };

        let report = picker.report().clone();
        if report.relaxed > 0 {
            log::warn!(
                "Uniqueness relaxed {} time(s): min_unique_chords {} exceeds {} available chords",
                report.relaxed,
                request.min_unique_chords,
                table.len()
            );
        }
        log::info!(
            "Composed {} chord(s) in {} from {} candidates",
            picks.len(),
            key,
            table.len()
        );
        Ok(Composition {
            key,
            picks: picks.iter().map(|&i| table.chords()[i].name.clone()).collect(),
            sequences: composers.into_iter().map(SequenceComposer::finish).collect(),
            report,
        })
    }

    /// Render `request` to a single-track MIDI file.
    pub fn generate_midi(&mut self, request: &GenerationRequest) -> Result<Vec<u8>> {
        let composition = self.compose(request, &[request.mode])?;
        Ok(midi::encode_sequences(&composition.sequences, &self.config)?)
    }

    /// Render one shared pick sequence in several modes, one track each.
    pub fn generate_midi_layers(
        &mut self,
        request: &GenerationRequest,
        modes: &[PlacementMode],
    ) -> Result<Vec<u8>> {
        let composition = self.compose(request, modes)?;
        Ok(midi::encode_sequences(&composition.sequences, &self.config)?)
    }

    /// Encode a caller-supplied progression of MIDI note sets, one bar each.
    pub fn generate_midi_chord_progression(&self, chords: &[Vec<i32>]) -> Result<Vec<u8>> {
        Ok(midi::encode_progression(chords, &self.config)?)
    }

    /// List the vocabulary for `query`. An empty custom selection lists
    /// nothing rather than failing.
    pub fn get_chords_of_key(&mut self, query: &ChordQuery, show_probabilities: bool) -> Result<ChordListing> {
        let key = query.key.or_c_minor();
        let table = self.table(&query.selection(), key, query.scale, query.table_scheme);
        let probs = show_probabilities.then(|| probabilities(&table));
        self.listing(&table, probs.as_deref())
    }

    /// List the chords of `query` that sound every note in `target_notes`.
    /// No targets means no matches.
    pub fn chord_finder(&mut self, query: &ChordQuery, target_notes: &[String]) -> Result<ChordListing> {
        let targets = target_notes
            .iter()
            .map(|n| n.parse::<PitchClass>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let key = query.key.or_c_minor();
        let table = self.table(&query.selection(), key, query.scale, query.table_scheme);
        let found = if targets.is_empty() {
            ChordTable::arrange(Vec::new(), query.table_scheme)
        } else {
            table.containing_all(&targets)
        };
        self.listing(&found, None)
    }

    fn view(&self, chord: &ChordInstance, probability: Option<ChordProbability>) -> Result<ChordView> {
        let preview = midi::chord_preview(chord, &self.config)?;
        Ok(ChordView {
            name: chord.name.clone(),
            chord_type: chord.chord_type,
            root: chord.root.name(),
            notes: chord.note_names(),
            midi: STANDARD.encode(preview),
            probability,
        })
    }

    fn listing(&self, table: &ChordTable, probs: Option<&[ChordProbability]>) -> Result<ChordListing> {
        let views = table
            .chords()
            .iter()
            .enumerate()
            .map(|(i, chord)| self.view(chord, probs.and_then(|p| p.get(i).copied())))
            .collect::<Result<Vec<_>>>()?;

        let by_name = |list: &mut Vec<ChordView>| list.sort_by(|a, b| a.name.cmp(&b.name));
        let mut chord_table: Vec<Vec<ChordView>> = table
            .columns()
            .iter()
            .map(|column| column.iter().map(|&i| views[i].clone()).collect())
            .collect();
        chord_table.iter_mut().for_each(by_name);
        let mut chord_list = views;
        by_name(&mut chord_list);
        Ok(ChordListing {
            chord_list,
            chord_table,
        })
    }
}

/// `Engine::generate_midi` on a fresh, cache-less engine.
pub fn generate_midi(request: &GenerationRequest) -> Result<Vec<u8>> {
    Engine::uncached(GeneratorConfig::default()).generate_midi(request)
}

/// `Engine::generate_midi_layers` on a fresh, cache-less engine.
pub fn generate_midi_layers(request: &GenerationRequest, modes: &[PlacementMode]) -> Result<Vec<u8>> {
    Engine::uncached(GeneratorConfig::default()).generate_midi_layers(request, modes)
}

/// `Engine::generate_midi_chord_progression` with the default config.
pub fn generate_midi_chord_progression(chords: &[Vec<i32>]) -> Result<Vec<u8>> {
    Engine::uncached(GeneratorConfig::default()).generate_midi_chord_progression(chords)
}

/// The listing as JSON: `{"chord_list": [...], "chord_table": [[...] x 12]}`.
pub fn get_chords_of_key(query: &ChordQuery, show_probabilities: bool) -> Result<String> {
    Engine::uncached(GeneratorConfig::default())
        .get_chords_of_key(query, show_probabilities)?
        .to_json()
}

/// The chord-finder listing as JSON, same shape as `get_chords_of_key`.
pub fn chord_finder(query: &ChordQuery, target_notes: &[String]) -> Result<String> {
    Engine::uncached(GeneratorConfig::default())
        .chord_finder(query, target_notes)?
        .to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MusicError;

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest {
            seed: SeedInput::text(text),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_missing_input() {
        let mut engine = Engine::default();
        let err = engine.generate_midi(&GenerationRequest::default()).unwrap_err();
        assert!(matches!(err, MusicError::Validation(ValidationError::NoInput)));
    }

    #[test]
    fn test_rejects_empty_custom_selection() {
        let mut engine = Engine::default();
        let req = GenerationRequest {
            chord_group: ChordGroup::Custom,
            ..request("hi")
        };
        let err = engine.generate_midi(&req).unwrap_err();
        assert!(matches!(err, MusicError::Validation(ValidationError::EmptyCustomSelection)));
    }

    #[test]
    fn test_rejects_bad_duration() {
        let req = GenerationRequest {
            duration: Some(0.0),
            ..request("hi")
        };
        assert!(matches!(req.validate(), Err(ValidationError::InvalidDuration(_))));
    }

    #[test]
    fn test_rejects_bad_rhythm_hint() {
        for hint in [f64::INFINITY, f64::NAN, -1.0] {
            let req = GenerationRequest {
                mode: PlacementMode::Intended,
                rhythm: vec![1.0, hint],
                ..request("hi")
            };
            assert!(matches!(req.validate(), Err(ValidationError::InvalidDuration(_))));
        }
    }

    #[test]
    fn test_timeline_limit_follows_the_timebase() {
        let req = GenerationRequest {
            mode: PlacementMode::MelodyV3,
            duration: Some(2.0e6),
            num_chords: 2,
            ..request("long")
        };
        let hi_res = GeneratorConfig {
            ticks_per_quarter: 30000,
            ..Default::default()
        };
        let err = Engine::new(hi_res).generate_midi(&req).unwrap_err();
        assert!(matches!(
            err,
            MusicError::Validation(ValidationError::TimelineTooLong { .. })
        ));

        let short = GenerationRequest {
            duration: Some(1.0),
            ..req
        };
        let config = GeneratorConfig::default();
        assert!(short.check_timeline(&config, &PlacementMode::ALL).is_ok());
    }

    #[test]
    fn test_rhythm_counts_only_for_intended() {
        let req = GenerationRequest {
            rhythm: vec![4.0e6],
            num_chords: 2,
            ..request("hints")
        };
        let config = GeneratorConfig::default();
        assert!(req.check_timeline(&config, &[PlacementMode::Chords]).is_ok());
        assert!(matches!(
            req.check_timeline(&config, &[PlacementMode::Chords, PlacementMode::Intended]),
            Err(ValidationError::TimelineTooLong { .. })
        ));
    }

    #[test]
    fn test_cached_and_uncached_agree() {
        let req = GenerationRequest {
            mode: PlacementMode::MelodyV3,
            scale: Scale::Harmonic,
            ..request("same bytes")
        };
        let mut cached = Engine::new(GeneratorConfig::default());
        let first = cached.generate_midi(&req).unwrap();
        let second = cached.generate_midi(&req).unwrap();
        let fresh = generate_midi(&req).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, fresh);
        assert_eq!(cached.cache().map(|c| c.stats()), Some((1, 1)));
    }

    #[test]
    fn test_empty_vocabulary_writes_empty_track() {
        let req = GenerationRequest {
            chord_group: ChordGroup::Custom,
            custom_chords: vec!["not_a_chord".to_string()],
            ..request("hi")
        };
        let mut engine = Engine::default();
        let composition = engine.compose(&req, &[PlacementMode::Chords]).unwrap();
        assert!(composition.picks.is_empty());
        assert!(composition.sequences[0].notes.is_empty());
        assert!(engine.generate_midi(&req).is_ok());
    }

    #[test]
    fn test_same_chords_across_modes() {
        let mut engine = Engine::default();
        let req = request("layers");
        let layered = engine
            .compose(&req, &[PlacementMode::Chords, PlacementMode::Melody])
            .unwrap();
        let slot_chords = |s: &Sequence| s.slots.iter().map(|c| c.chord.clone()).collect::<Vec<_>>();
        assert_eq!(slot_chords(&layered.sequences[0]), slot_chords(&layered.sequences[1]));
        assert_eq!(slot_chords(&layered.sequences[0]), layered.picks);
    }

    #[test]
    fn test_custom_listing_with_empty_selection_is_empty() {
        let mut engine = Engine::default();
        let query = ChordQuery {
            chord_group: ChordGroup::CustomPruning,
            ..Default::default()
        };
        let listing = engine.get_chords_of_key(&query, true).unwrap();
        assert!(listing.chord_list.is_empty());
        assert_eq!(listing.chord_table.len(), 12);
    }

    #[test]
    fn test_finder_rejects_bad_note() {
        let mut engine = Engine::default();
        let err = engine
            .chord_finder(&ChordQuery::default(), &["C".to_string(), "Q".to_string()])
            .unwrap_err();
        assert!(matches!(err, MusicError::Validation(ValidationError::InvalidNote(_))));
    }

    #[test]
    fn test_listing_views_carry_preview() {
        let mut engine = Engine::default();
        let listing = engine.get_chords_of_key(&ChordQuery::default(), false).unwrap();
        let first = &listing.chord_list[0];
        let bytes = STANDARD.decode(&first.midi).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
        assert!(first.probability.is_none());
    }
}
