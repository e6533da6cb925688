// Throughput of the generation pipeline.
//
// `table_build` measures vocabulary + scale filter + arrangement for the
// largest group (every catalog chord at all 12 roots); `generate_midi`
// measures a full request on a cached and an uncached engine.

use chordsmith_engine::cache::build_table;
use chordsmith_engine::vocabulary::{CATALOG, GroupSelection};
use chordsmith_engine::{
    ChordGroup, Engine, GenerationRequest, GeneratorConfig, Key, PlacementMode, Scale, SeedInput,
    TableScheme,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_table_build(c: &mut Criterion) {
    let selection = GroupSelection::new(ChordGroup::CustomPruning, CATALOG.iter().map(|d| d.id));
    let mut group = c.benchmark_group("table_build");
    for scale in [Scale::Disabled, Scale::Natural, Scale::AllNotes] {
        group.bench_function(BenchmarkId::from_parameter(scale), |b| {
            b.iter(|| {
                black_box(build_table(
                    &selection,
                    Key::c_minor(),
                    scale,
                    TableScheme::ContainsNote,
                ))
            });
        });
    }
    group.finish();
}

fn bench_generate_midi(c: &mut Criterion) {
    let request = GenerationRequest {
        seed: SeedInput::text("benchmark seed material"),
        mode: PlacementMode::MelodyV3,
        num_chords: 32,
        chord_group: ChordGroup::Default,
        scale: Scale::Harmonic,
        min_unique_chords: 4,
        ..Default::default()
    };
    let mut group = c.benchmark_group("generate_midi");
    group.bench_function("uncached", |b| {
        b.iter(|| {
            let mut engine = Engine::uncached(GeneratorConfig::default());
            black_box(engine.generate_midi(&request))
        });
    });
    let mut cached = Engine::new(GeneratorConfig::default());
    group.bench_function("cached", |b| {
        b.iter(|| black_box(cached.generate_midi(&request)));
    });
    group.finish();
}

criterion_group!(benches, bench_table_build, bench_generate_midi);
criterion_main!(benches);
