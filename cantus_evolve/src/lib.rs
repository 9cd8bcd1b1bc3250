// Cantus melody evolver
//
// Evolves melodic variations of one or more reference melodies with a
// genetic search. Candidates are scored by how closely their sounding
// pitch classes follow the references (after transposing onto each one), and
// fitness peaks just short of an exact copy so the search settles on
// variations rather than reproductions.
//
// Architecture:
// - selection.rs: The chromosome (slots of note / hold / rest at a chunk size),
//   equalization, transposition, and repair
// - similarity.rs: Octave-blind cosine similarity and corpus aggregation
// - operators.rs: Multi-point crossover and representation-aware mutation
// - ga.rs: `MusicGa`, the generational loop (elitism + binary tournaments)
// - config.rs: `GaConfig`, every tunable of a run, JSON-loadable
// - error.rs: `CantusError` for invalid corpus, config, and I/O
// - corpus.rs: Manifest and melody file loading
// - notation.rs: Note-name transcription
// - event_trace.rs: Text MIDI event trace for an external assembler
// - report.rs: Population tables and per-generation dumps
//
// Randomness comes from a single `cantus_prng::CantusRng` owned by the engine,
// so a run is reproducible from its seed.

pub mod config;
pub mod corpus;
pub mod error;
pub mod event_trace;
pub mod ga;
pub mod notation;
pub mod operators;
pub mod report;
pub mod selection;
pub mod similarity;

pub use config::{FitnessAggregation, GaConfig};
pub use error::{CantusError, Result};
pub use ga::{GenerationObserver, MusicGa, RunSummary};
pub use selection::{Chunk, Selection};
