// Population dumps for inspecting a run.
//
// `population_table` lays the population out column-wise: one row per slot
// index, one 3-wide column of chunk codes per individual, with 0 filling in
// past the end of shorter melodies. It's meant for plotting or diffing
// generations, not for reading back. `population_summary` lists each
// individual with its scores.
//
// `PopulationDump` is a `GenerationObserver` that writes the table to
// `population<N>.txt` every few generations.

use crate::error::{CantusError, Result};
use crate::ga::{GenerationObserver, MusicGa};
use crate::selection::Selection;
use log::warn;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Slot-by-individual table of chunk codes.
pub fn population_table(population: &[Selection]) -> String {
    let rows = population.iter().map(Selection::len).max().unwrap_or(0);
    let mut out = String::new();
    for row in 0..rows {
        let _ = write!(out, "{row} ");
        for s in population {
            let code = if row < s.len() { s.get(row).code() } else { 0 };
            let _ = write!(out, "{code:3} ");
        }
        out.push('\n');
    }
    out
}

/// Every individual's codes followed by its corpus similarity and fitness.
pub fn population_summary(ga: &MusicGa) -> String {
    let mut out = String::new();
    for s in ga.population() {
        let _ = writeln!(out, "{s}");
        let _ = writeln!(out, "{}, {}", ga.fitness_orig(s), ga.fitness(s));
    }
    out
}

/// Writes `population_table` to `<dir>/population<N>.txt` whenever the
/// generation number is a multiple of `every`.
///
/// Observers can't fail a run, so the first write error is kept for the
/// caller to check afterwards and later ones are only logged.
pub struct PopulationDump {
    dir: PathBuf,
    every: usize,
    written: Vec<PathBuf>,
    error: Option<CantusError>,
}

impl PopulationDump {
    pub fn new(dir: impl Into<PathBuf>, every: usize) -> Self {
        PopulationDump {
            dir: dir.into(),
            every: every.max(1),
            written: Vec::new(),
            error: None,
        }
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Surface the first write failure, if any.
    pub fn finish(self) -> Result<Vec<PathBuf>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.written),
        }
    }
}

impl GenerationObserver for PopulationDump {
    fn on_generation(&mut self, generation: usize, population: &[Selection], _fitness: &[f64]) {
        if generation % self.every != 0 {
            return;
        }
        let path = self.dir.join(format!("population{generation}.txt"));
        match std::fs::write(&path, population_table(population)) {
            Ok(()) => self.written.push(path),
            Err(e) => {
                warn!("could not write {}: {e}", path.display());
                if self.error.is_none() {
                    self.error = Some(CantusError::io(path, e));
                }
            }
        }
    }
}
