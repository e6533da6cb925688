// End-to-end generation through the public API.
//
// Covers reproducibility of deterministic requests, the pattern override,
// the uniqueness property across whole requests, validation failures, and
// structural checks on the emitted MIDI.

use chordsmith_engine::{
    ChordGroup, Engine, GenerationRequest, GeneratorConfig, KeySpec, MusicError,
    PickingMethod, PlacementMode, Scale, SeedInput, ValidationError, generate_midi,
    generate_midi_chord_progression, generate_midi_layers,
};
use midly::{Format, MidiMessage, Smf, TrackEventKind};

fn request(text: &str) -> GenerationRequest {
    GenerationRequest {
        seed: SeedInput::text(text),
        ..Default::default()
    }
}

fn note_on_count(bytes: &[u8]) -> usize {
    let smf = Smf::parse(bytes).unwrap();
    smf.tracks
        .iter()
        .flatten()
        .filter(|e| {
            matches!(
                e.kind,
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { .. },
                    ..
                }
            )
        })
        .count()
}

#[test]
fn deterministic_requests_are_byte_identical() {
    for mode in PlacementMode::ALL {
        for scale in [Scale::Disabled, Scale::Natural, Scale::AllNotes] {
            let req = GenerationRequest {
                mode,
                scale,
                chord_group: ChordGroup::Default,
                num_chords: 8,
                ..request("the same words every time")
            };
            assert_eq!(generate_midi(&req).unwrap(), generate_midi(&req).unwrap(), "{mode} {scale}");
        }
    }
}

#[test]
fn different_seeds_give_different_files() {
    let a = generate_midi(&request("alpha")).unwrap();
    let b = generate_midi(&request("beta")).unwrap();
    assert_ne!(a, b);
}

#[test]
fn file_bytes_and_vibe_feed_the_seed() {
    let text_only = request("x");
    let with_file = GenerationRequest {
        seed: SeedInput::new(vec![1, 2, 3], "x"),
        ..Default::default()
    };
    let with_vibe = GenerationRequest {
        seed: SeedInput::text("x").with_vibe("4"),
        ..Default::default()
    };
    let base = generate_midi(&text_only).unwrap();
    assert_ne!(base, generate_midi(&with_file).unwrap());
    assert_ne!(base, generate_midi(&with_vibe).unwrap());
}

#[test]
fn pattern_cycles_over_committed_picks() {
    let req = GenerationRequest {
        mode: PlacementMode::Chords,
        num_chords: 4,
        use_same_chords: true,
        pattern: Some("1-2-1-3".to_string()),
        chord_group: ChordGroup::Default,
        min_unique_chords: 3,
        ..request("pattern seed")
    };
    let mut engine = Engine::default();
    let composition = engine.compose(&req, &[PlacementMode::Chords]).unwrap();
    assert_eq!(composition.picks.len(), 3);
    let slots: Vec<&str> = composition.sequences[0]
        .slots
        .iter()
        .map(|s| s.chord.as_str())
        .collect();
    let p = &composition.picks;
    assert_eq!(slots, vec![p[0].as_str(), p[1].as_str(), p[0].as_str(), p[2].as_str()]);
}

#[test]
fn pattern_is_ignored_outside_chords_mode() {
    let base = GenerationRequest {
        mode: PlacementMode::Melody,
        ..request("melody seed")
    };
    let patterned = GenerationRequest {
        pattern: Some("1-1-1-1".to_string()),
        ..base.clone()
    };
    assert_eq!(generate_midi(&base).unwrap(), generate_midi(&patterned).unwrap());
}

#[test]
fn invalid_pattern_is_ignored() {
    let base = request("bad pattern");
    let patterned = GenerationRequest {
        pattern: Some("1-0-x".to_string()),
        ..base.clone()
    };
    assert_eq!(generate_midi(&base).unwrap(), generate_midi(&patterned).unwrap());
}

#[test]
fn oversized_pattern_index_is_ignored() {
    let base = GenerationRequest {
        num_chords: 4,
        ..request("huge index")
    };
    let patterned = GenerationRequest {
        pattern: Some("1-2000000".to_string()),
        ..base.clone()
    };
    let composition = Engine::default()
        .compose(&patterned, &[PlacementMode::Chords])
        .unwrap();
    assert_eq!(composition.picks.len(), 4);
    assert_eq!(generate_midi(&base).unwrap(), generate_midi(&patterned).unwrap());
}

#[test]
fn consecutive_picks_respect_min_unique() {
    let k = 5;
    let mut engine = Engine::default();
    for (i, method) in [PickingMethod::Original, PickingMethod::Uniform].into_iter().enumerate() {
        for seed in 0..10 {
            let req = GenerationRequest {
                num_chords: 40,
                min_unique_chords: k,
                picking_method: method,
                chord_group: ChordGroup::Default,
                scale: Scale::Natural,
                ..request(&format!("window {i} {seed}"))
            };
            let composition = engine.compose(&req, &[PlacementMode::Chords]).unwrap();
            assert_eq!(composition.report.relaxed, 0);
            for window in composition.picks.windows(k) {
                for a in 0..k {
                    for b in (a + 1)..k {
                        assert_ne!(window[a], window[b], "{method:?}: {:?}", composition.picks);
                    }
                }
            }
        }
    }
}

#[test]
fn oversized_window_relaxes_instead_of_failing() {
    let req = GenerationRequest {
        chord_group: ChordGroup::Custom,
        custom_chords: vec!["major7".to_string()],
        min_unique_chords: 10,
        num_chords: 6,
        ..request("tiny vocabulary")
    };
    let mut engine = Engine::default();
    let composition = engine.compose(&req, &[PlacementMode::Chords]).unwrap();
    assert_eq!(composition.picks.len(), 6);
    assert!(composition.report.relaxed > 0);
}

#[test]
fn validation_errors_surface_before_work() {
    let none = generate_midi(&GenerationRequest::default()).unwrap_err();
    assert!(matches!(none, MusicError::Validation(ValidationError::NoInput)));

    let empty_custom = GenerationRequest {
        chord_group: ChordGroup::CustomPruning,
        ..request("text")
    };
    let err = generate_midi(&empty_custom).unwrap_err();
    assert!(matches!(err, MusicError::Validation(ValidationError::EmptyCustomSelection)));
}

#[test]
fn huge_duration_is_rejected_not_rendered() {
    for mode in PlacementMode::ALL {
        let req = GenerationRequest {
            mode,
            duration: Some(2.0e6),
            num_chords: 2,
            ..request("very long slots")
        };
        let err = generate_midi(&req).unwrap_err();
        assert!(
            matches!(err, MusicError::Validation(ValidationError::TimelineTooLong { .. })),
            "{mode}: {err}"
        );
    }

    let hints = GenerationRequest {
        mode: PlacementMode::Intended,
        rhythm: vec![1.0, 1.0e9],
        ..request("very long hints")
    };
    let err = generate_midi(&hints).unwrap_err();
    assert!(matches!(err, MusicError::Validation(ValidationError::TimelineTooLong { .. })));
}

#[test]
fn chords_mode_writes_one_onset_group_per_slot() {
    let req = GenerationRequest {
        num_chords: 4,
        chord_group: ChordGroup::Default,
        ..request("count the chords")
    };
    let mut engine = Engine::default();
    let composition = engine.compose(&req, &[PlacementMode::Chords]).unwrap();
    let seq = &composition.sequences[0];
    let mut starts: Vec<u32> = seq.notes.iter().map(|n| n.start).collect();
    starts.dedup();
    assert_eq!(starts, vec![0, 384, 768, 1152]);

    let bytes = engine.generate_midi(&req).unwrap();
    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(smf.header.format, Format::SingleTrack);
    assert_eq!(note_on_count(&bytes), seq.notes.len());
}

#[test]
fn duration_sets_slot_length() {
    let req = GenerationRequest {
        num_chords: 3,
        duration: Some(2.0),
        ..request("short slots")
    };
    let composition = Engine::default()
        .compose(&req, &[PlacementMode::Chords])
        .unwrap();
    let starts: Vec<u32> = composition.sequences[0].slots.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![0, 192, 384]);
}

#[test]
fn random_key_is_resolved_from_the_seed() {
    let req = GenerationRequest {
        key: KeySpec::Random,
        ..request("which key")
    };
    let mut engine = Engine::default();
    let a = engine.compose(&req, &[PlacementMode::Chords]).unwrap().key;
    let b = engine.compose(&req, &[PlacementMode::Chords]).unwrap().key;
    assert_eq!(a, b);
}

#[test]
fn layers_share_picks_in_one_format_1_file() {
    let req = request("layered");
    let modes = [PlacementMode::Chords, PlacementMode::MelodyV2, PlacementMode::Intended];
    let bytes = generate_midi_layers(&req, &modes).unwrap();
    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(smf.header.format, Format::Parallel);
    assert_eq!(smf.tracks.len(), 3);
}

#[test]
fn same_chords_across_single_mode_requests() {
    let mut engine = Engine::default();
    let picks_for = |engine: &mut Engine, mode: PlacementMode| {
        let req = GenerationRequest {
            mode,
            use_same_chords: true,
            ..request("shared harmony")
        };
        engine.compose(&req, &[mode]).unwrap().picks
    };
    let chords = picks_for(&mut engine, PlacementMode::Chords);
    for mode in [PlacementMode::Melody, PlacementMode::MelodyV2, PlacementMode::MelodyV3] {
        assert_eq!(picks_for(&mut engine, mode), chords, "{mode}");
    }
}

#[test]
fn randomized_requests_still_produce_valid_files() {
    let req = GenerationRequest {
        randomize: true,
        ..request("noise")
    };
    let bytes = generate_midi(&req).unwrap();
    assert!(Smf::parse(&bytes).is_ok());
}

#[test]
fn config_changes_timebase() {
    let config = GeneratorConfig {
        ticks_per_quarter: 480,
        tempo_bpm: Some(100),
        ..Default::default()
    };
    let bytes = Engine::new(config).generate_midi(&request("hi-res")).unwrap();
    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(smf.header.timing, midly::Timing::Metrical(midly::num::u15::new(480)));
}

#[test]
fn explicit_progression_round_trips_notes() {
    let bytes = generate_midi_chord_progression(&[vec![60, 63, 67], vec![58, 62, 65]]).unwrap();
    assert_eq!(note_on_count(&bytes), 6);
    assert!(generate_midi_chord_progression(&[vec![128]]).is_err());
}

#[test]
fn major_and_relative_minor_share_a_vocabulary() {
    let minor = GenerationRequest {
        key: "Amin".parse().unwrap(),
        ..request("relative")
    };
    let major = GenerationRequest {
        key: "Cmaj".parse().unwrap(),
        ..minor.clone()
    };
    assert_eq!(generate_midi(&minor).unwrap(), generate_midi(&major).unwrap());
}
