// Chordsmith CLI entry point.
//
// Thin wrapper over the engine's boundary operations:
//   generate midi --text "seed text" [--file input.bin] [--mode chords] ... -o out.mid
//   generate progression 60,64,67 65,69,72 -o prog.mid
//   generate chords --key Cmin --group original --scale natural [--probabilities]
//   generate find C E G --group default
//
// MIDI goes to the output path; listings print JSON to stdout. `--config`
// loads a JSON `GeneratorConfig`; `-v` raises the log level.

use anyhow::{Context, Result};
use chordsmith_engine::{
    ChordGroup, ChordQuery, Engine, GenerationRequest, GeneratorConfig, KeySpec, PickingMethod,
    PlacementMode, Scale, SeedInput, TableScheme,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "generate", version, about = "Procedural chord and MIDI generator")]
struct Cli {
    /// JSON generator config (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand that builds a vocabulary.
#[derive(Args)]
struct VocabularyArgs {
    /// Key such as Cmin, F#maj, or random
    #[arg(long, default_value = "Cmin")]
    key: KeySpec,

    /// Chord group: default, original, custom, custom_pruning
    #[arg(long, default_value = "original")]
    group: ChordGroup,

    /// Chord type ids for the custom groups (repeatable)
    #[arg(long = "chord")]
    custom: Vec<String>,

    /// Scale: disabled, all_notes, natural, harmonic, melodic, ...
    #[arg(long, default_value = "disabled")]
    scale: Scale,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a MIDI sequence seeded from input bytes
    Midi {
        #[command(flatten)]
        vocabulary: VocabularyArgs,

        /// Text seed material
        #[arg(long, default_value = "")]
        text: String,

        /// File whose bytes are seed material
        #[arg(long)]
        file: Option<PathBuf>,

        /// Extra tag appended to the seed material
        #[arg(long, default_value = "")]
        vibe: String,

        /// Placement mode (repeat for a multi-track file)
        #[arg(long = "mode", default_value = "chords")]
        modes: Vec<PlacementMode>,

        /// Number of chord slots
        #[arg(short = 'n', long, default_value = "4")]
        num_chords: usize,

        /// Pick each slot independently instead of committing all picks first
        #[arg(long)]
        different_chords: bool,

        /// Picking method: original (2d) or uniform (1d)
        #[arg(long, default_value = "original")]
        picking: PickingMethod,

        /// Any N consecutive chords are distinct
        #[arg(long, default_value = "2")]
        min_unique: usize,

        /// Mix OS entropy into the seed (not reproducible)
        #[arg(long)]
        randomize: bool,

        /// Slot pattern such as 1-2-1-3
        #[arg(long)]
        pattern: Option<String>,

        /// Slot length in beats
        #[arg(long)]
        duration: Option<f64>,

        /// Beat hints for intended placement, comma separated
        #[arg(long, value_delimiter = ',')]
        rhythm: Vec<f64>,

        /// Output path
        #[arg(short, long, default_value = "output.mid")]
        output: PathBuf,
    },

    /// Encode an explicit progression; each chord is comma-separated MIDI notes
    Progression {
        chords: Vec<String>,

        #[arg(short, long, default_value = "progression.mid")]
        output: PathBuf,
    },

    /// Print the chord table of a key as JSON
    Chords {
        #[command(flatten)]
        vocabulary: VocabularyArgs,

        /// Table scheme: contains_note, highest_note, lowest_note
        #[arg(long, default_value = "contains_note")]
        scheme: TableScheme,

        /// Include 1D/2D selection probabilities
        #[arg(long)]
        probabilities: bool,
    },

    /// Print chords containing all of the given notes as JSON
    Find {
        notes: Vec<String>,

        #[command(flatten)]
        vocabulary: VocabularyArgs,

        #[arg(long, default_value = "contains_note")]
        scheme: TableScheme,
    },
}

impl VocabularyArgs {
    fn query(self, table_scheme: TableScheme) -> ChordQuery {
        ChordQuery {
            key: self.key,
            custom_chords: self.custom,
            chord_group: self.group,
            scale: self.scale,
            table_scheme,
        }
    }
}

fn parse_chord(text: &str) -> Result<Vec<i32>> {
    text.split(',')
        .map(|n| {
            n.trim()
                .parse::<i32>()
                .with_context(|| format!("'{n}' is not a MIDI note number"))
        })
        .collect()
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    let mut engine = Engine::new(config);

    match cli.command {
        Commands::Midi {
            vocabulary,
            text,
            file,
            vibe,
            modes,
            num_chords,
            different_chords,
            picking,
            min_unique,
            randomize,
            pattern,
            duration,
            rhythm,
            output,
        } => {
            let file_bytes = match &file {
                Some(path) => std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => Vec::new(),
            };
            let request = GenerationRequest {
                seed: SeedInput::new(file_bytes, text).with_vibe(vibe),
                mode: modes.first().copied().unwrap_or(PlacementMode::Chords),
                use_same_chords: !different_chords,
                num_chords,
                key: vocabulary.key,
                custom_chords: vocabulary.custom,
                chord_group: vocabulary.group,
                picking_method: picking,
                min_unique_chords: min_unique,
                scale: vocabulary.scale,
                randomize,
                pattern,
                duration,
                rhythm,
            };
            let bytes = if modes.len() > 1 {
                engine.generate_midi_layers(&request, &modes)?
            } else {
                engine.generate_midi(&request)?
            };
            write_output(&output, &bytes)?;
        }
        Commands::Progression { chords, output } => {
            let chords = chords
                .iter()
                .map(|c| parse_chord(c))
                .collect::<Result<Vec<_>>>()?;
            let bytes = engine.generate_midi_chord_progression(&chords)?;
            write_output(&output, &bytes)?;
        }
        Commands::Chords {
            vocabulary,
            scheme,
            probabilities,
        } => {
            let listing = engine.get_chords_of_key(&vocabulary.query(scheme), probabilities)?;
            println!("{}", listing.to_json()?);
        }
        Commands::Find {
            notes,
            vocabulary,
            scheme,
        } => {
            let listing = engine.chord_finder(&vocabulary.query(scheme), &notes)?;
            println!("{}", listing.to_json()?);
        }
    }

    Ok(())
}
