// Sight-reading exercise generator: CLI entry point.
//
// Builds a practice configuration, generates measures from a seeded music
// stream, prints each measure's spelled notes per clef, and writes the
// result to MIDI.
//
// Usage:
//   cargo run -p sightread_music -- [output.mid] [--config FILE]
//     [--difficulty N] [--measures N] [--seed N]
//
// `--config` takes precedence over `--difficulty` (default 1). Set RUST_LOG
// (e.g. `RUST_LOG=debug`) to see pattern selection and spelling decisions.

use sightread_music::config::PracticeConfig;
use sightread_music::error::MusicError;
use sightread_music::midi::write_midi;
use sightread_music::sound::NoteGroup;
use sightread_music::stream::MusicStream;
use sightread_prng::PracticeRng;
use std::path::Path;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("  Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), MusicError> {
    let args: Vec<String> = std::env::args().collect();

    // Parse arguments
    let output_path = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("output.mid");
    let config_path: Option<String> = parse_flag(&args, "--config");
    let difficulty: u32 = parse_flag(&args, "--difficulty").unwrap_or(1);
    let num_measures: usize = parse_flag(&args, "--measures").unwrap_or(8);
    let seed: Option<u64> = parse_flag(&args, "--seed");

    println!("=== Sight-Reading Exercise Generator ===");
    println!("Output: {output_path}");
    println!("Measures: {num_measures}");
    if let Some(s) = seed {
        println!("Seed: {s}");
    }
    println!();

    println!("[1/4] Building configuration...");
    let config = match &config_path {
        Some(path) => {
            println!("  Loading {path}");
            PracticeConfig::load(Path::new(path))?
        }
        None => {
            println!("  Difficulty {difficulty} preset");
            PracticeConfig::for_difficulty(difficulty)?
        }
    };
    println!(
        "  Time signature {}, adjacent note distance {}, tempo {} BPM",
        config.time_signature, config.adjacent_note_distance, config.tempo
    );

    println!("[2/4] Starting music stream...");
    let rng = match seed {
        Some(s) => PracticeRng::new(s),
        None => PracticeRng::from_time(),
    };
    let mut stream = MusicStream::new(config.clone(), rng)?;
    let key = stream.key().copied();
    match &key {
        Some(key) => println!("  Key: {key}"),
        None => println!("  Key: none (chromatic)"),
    }

    println!("[3/4] Generating {num_measures} measures...");
    let mut measures = Vec::with_capacity(num_measures);
    for i in 0..num_measures {
        let music = stream.next_measure();
        let labeled = sightread_music::spelling::label_music(&music, key.as_ref());
        if config.include_treble_clef {
            println!("  {:>3} treble: {}", i + 1, join_groups(&labeled.treble_clef));
        }
        if config.include_bass_clef {
            println!("  {:>3} bass:   {}", i + 1, join_groups(&labeled.bass_clef));
        }
        measures.push(music);
    }

    println!("[4/4] Writing MIDI to {output_path}...");
    write_midi(&measures, &config, Path::new(output_path))?;
    println!("  Done!");

    println!();
    println!("Play with: timidity {output_path} (or any MIDI player)");
    Ok(())
}

fn join_groups(groups: &[NoteGroup]) -> String {
    groups
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
