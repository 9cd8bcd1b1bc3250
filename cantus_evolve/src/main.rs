// Cantus melody evolver: CLI entry point.
//
// Loads a reference corpus from a manifest, evolves a population of
// variations, and writes the best one as a text MIDI event trace.
// The pipeline: corpus loading → engine setup → evolution → output.
//
// Usage:
//   cargo run -p cantus_evolve -- [manifest.txt] [--generations N] [--seed N]
//     [--config FILE] [--output FILE] [--song-name NAME]
//     [--aggregation average|min|max] [--niching] [--dump-every N]
//
// Set RUST_LOG=debug to see per-generation fitness.

use cantus_evolve::config::{FitnessAggregation, GaConfig};
use cantus_evolve::corpus::load_corpus;
use cantus_evolve::error::Result;
use cantus_evolve::event_trace::write_event_trace;
use cantus_evolve::ga::MusicGa;
use cantus_evolve::notation::to_note_names;
use cantus_evolve::report::PopulationDump;
use std::path::Path;
use std::time::Instant;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let started = Instant::now();

    let manifest = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("files.txt");
    let output = parse_flag::<String>(args, "--output").unwrap_or_else(|| "variant.txt".into());
    let song_name =
        parse_flag::<String>(args, "--song-name").unwrap_or_else(|| "Invention No. 1".into());
    let dump_every: Option<usize> = parse_flag(args, "--dump-every");

    let mut config = match parse_flag::<String>(args, "--config") {
        Some(path) => GaConfig::load(Path::new(&path))?,
        None => GaConfig::default(),
    };
    if let Some(seed) = parse_flag(args, "--seed") {
        config.seed = seed;
    }
    if let Some(generations) = parse_flag(args, "--generations") {
        config.generations = generations;
    }
    if let Some(name) = parse_flag::<String>(args, "--aggregation") {
        config.aggregation = FitnessAggregation::parse(&name).unwrap_or_else(|| {
            eprintln!("Unknown aggregation '{name}'. Using average.");
            FitnessAggregation::Average
        });
    }
    if args.iter().any(|a| a == "--niching") {
        config.niching = true;
    }

    println!("=== Cantus Melody Evolver ===");
    println!("Manifest: {manifest}");
    println!("Output: {output}");
    println!("Generations: {}", config.generations);
    println!("Seed: {}", config.seed);
    println!("Aggregation: {:?}{}", config.aggregation, if config.niching { " (niching)" } else { "" });
    println!();

    println!("[1/4] Loading corpus...");
    let corpus = load_corpus(Path::new(manifest))?;
    for (i, s) in corpus.iter().enumerate() {
        println!("  Reference {}: {} chunks at chunk size {}", i + 1, s.len(), s.chunk_size());
    }

    println!("[2/4] Seeding population...");
    let generations = config.generations;
    let mut ga = MusicGa::new(corpus, config)?;
    println!(
        "  {} individuals at common chunk size {}",
        ga.population().len(),
        ga.chunk_size()
    );

    println!("[3/4] Evolving...");
    let summary = match dump_every {
        Some(every) => {
            let mut dump = PopulationDump::new(".", every);
            let summary = ga.run_with(generations, &mut dump);
            let written = dump.finish()?;
            println!("  Wrote {} population dump(s).", written.len());
            summary
        }
        None => ga.run(generations),
    };
    let first = summary.fitness_trace.first().copied().unwrap_or(0.0);
    println!(
        "  Best fitness: {first:.4} -> {:.4} (delta {:+.4})",
        summary.best_fitness,
        summary.best_fitness - first
    );

    let best = &summary.best;
    println!("Best result:");
    println!("{best}");
    println!("{}, {}", ga.fitness_orig(best), ga.fitness(best));
    println!("{}", to_note_names(best));

    println!("[4/4] Writing event trace to {output}...");
    write_event_trace(best, &song_name, Path::new(&output))?;

    println!();
    println!("Total time taken: {} milliseconds", started.elapsed().as_millis());
    Ok(())
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
