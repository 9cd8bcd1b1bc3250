// Melodic similarity and the fitness it feeds.
//
// Two melodies are compared slot by slot on what is *sounding*, not on what
// is written: a note sets the current pitch class, holds and rests carry it
// forward, and until the first note the slot is silent. Octaves collapse
// (pitch mod 12), so a line doubled an octave lower still matches. The
// per-slot values go into a cosine similarity over the shorter length.
//
// Silence maps to 0 and pitch class `k` maps to `k + 1`, so C is
// distinguishable from silence and a melody with any note has a non-zero
// vector. If either vector is all zero the similarity is defined as 0.
//
// Corpus fitness transposes the candidate onto each reference (first notes
// aligned) before comparing, then reduces the per-reference scores with the
// run's `FitnessAggregation`. `MusicGa` adds the distance-from-target shaping
// and optional niching on top.

use crate::config::FitnessAggregation;
use crate::selection::{Chunk, Selection};

/// Per-slot sounding values over the first `len` slots (0 = silent,
/// 1..=12 = pitch class + 1).
fn sounding_profile(s: &Selection, len: usize) -> impl Iterator<Item = u32> + '_ {
    s.chunks()
        .iter()
        .take(len)
        .scan(0u32, |current, &chunk| {
            if let Chunk::Note(p) = chunk {
                *current = u32::from(p % 12) + 1;
            }
            Some(*current)
        })
}

/// Cosine similarity of the sounding pitch-class profiles of `a` and `b`,
/// truncated to the shorter of the two. In [0, 1]; 0 when either side never
/// sounds a note within the compared span.
pub fn similarity(a: &Selection, b: &Selection) -> f64 {
    let len = a.len().min(b.len());
    let mut dot = 0u64;
    let mut mag_a = 0u64;
    let mut mag_b = 0u64;
    for (x, y) in sounding_profile(a, len).zip(sounding_profile(b, len)) {
        let (x, y) = (u64::from(x), u64::from(y));
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    if mag_a == 0 || mag_b == 0 {
        return 0.0;
    }
    dot as f64 / ((mag_a as f64) * (mag_b as f64)).sqrt()
}

/// Copy of `candidate` shifted so its first note lands on the first note of
/// `reference`. Unchanged when either has no note.
pub fn transpose_onto(candidate: &Selection, reference: &Selection) -> Selection {
    match (candidate.first_pitch(), reference.first_pitch()) {
        (Some(c), Some(r)) => candidate.transposed(i32::from(r) - i32::from(c)),
        _ => candidate.clone(),
    }
}

/// Similarity of `candidate` to every reference, reduced by `aggregation`.
pub fn corpus_similarity(
    candidate: &Selection,
    corpus: &[Selection],
    aggregation: FitnessAggregation,
) -> f64 {
    let scores: Vec<f64> = corpus
        .iter()
        .map(|reference| similarity(reference, &transpose_onto(candidate, reference)))
        .collect();
    aggregation.reduce(&scores)
}

/// Fitness peaks at 1 when similarity equals `target` and falls off linearly
/// on either side.
pub fn shaped_fitness(similarity: f64, target: f64) -> f64 {
    1.0 - (similarity - target).abs()
}
