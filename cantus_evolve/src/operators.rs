// Genetic operators on `Selection`s: multi-point crossover and per-slot
// mutation.
//
// Both take the run's `CantusRng` explicitly so every draw happens in a fixed
// order on the engine thread. Neither operator aliases its inputs: crossover
// builds fresh children, and mutation edits a selection the caller already
// owns (the engine clones parents before mutating them).
//
// Mutation is representation-aware rather than a blind code swap:
// - a note moves by a small step relative to the note before it, so melodic
//   contour survives;
// - a hold or rest either flips to the other silence symbol, with guards so
//   a flip doesn't orphan or extend the following hold, or becomes a fresh
//   note (never at slot 0, so melodies don't gain a note there through this
//   path and can never start with a hold).

use crate::selection::{Chunk, MAX_PITCH, Selection};
use cantus_prng::CantusRng;

/// Crossover mask over `len` slots with `points` distinct toggle positions.
///
/// `true` marks slots whose values are swapped between children. A toggle
/// opens a swapped block and the next toggle closes it; both toggle slots
/// belong to the block. When `points` exceeds `len` every slot is a toggle.
pub fn crossover_mask(len: usize, points: usize, rng: &mut CantusRng) -> Vec<bool> {
    let points = points.min(len);
    let mut toggles = vec![false; len];
    let mut placed = 0;
    while placed < points {
        let loc = rng.choose_index(len);
        if !toggles[loc] {
            toggles[loc] = true;
            placed += 1;
        }
    }

    let mut inside = false;
    toggles
        .into_iter()
        .map(|toggle| {
            if toggle {
                inside = !inside;
                true
            } else {
                inside
            }
        })
        .collect()
}

/// Recombine two parents into two children.
///
/// Child one starts from `a`, child two from `b`; slots under a swapped
/// block of the mask trade places. If the parents differ in length, the
/// longer parent's tail is appended to child one, so child two always has
/// the shared length.
///
/// Panics if the parents have different chunk sizes.
pub fn crossover(
    a: &Selection,
    b: &Selection,
    points: usize,
    rng: &mut CantusRng,
) -> (Selection, Selection) {
    assert_eq!(
        a.chunk_size(),
        b.chunk_size(),
        "crossover: parents must share a chunk size"
    );
    let shared = a.len().min(b.len());
    let mask = crossover_mask(shared, points, rng);

    let mut first = Vec::with_capacity(a.len().max(b.len()));
    let mut second = Vec::with_capacity(shared);
    for (i, &swap) in mask.iter().enumerate() {
        let (x, y) = (a.get(i), b.get(i));
        if swap {
            first.push(y);
            second.push(x);
        } else {
            first.push(x);
            second.push(y);
        }
    }

    let longer = if a.len() >= b.len() { a } else { b };
    first.extend_from_slice(&longer.chunks()[shared..]);

    let chunk_size = a.chunk_size();
    (
        Selection::from_chunks(first, chunk_size),
        Selection::from_chunks(second, chunk_size),
    )
}

/// Mutate each slot independently with probability `probability`.
///
/// `distance` is the largest pitch step of a note mutation, in semitones.
pub fn mutate(s: &mut Selection, probability: f64, distance: u8, rng: &mut CantusRng) {
    for i in 0..s.len() {
        if !rng.random_bool(probability) {
            continue;
        }
        match s.get(i) {
            Chunk::Note(_) => mutate_to_note(s, i, distance, rng),
            silence => {
                if rng.coin() {
                    flip_silence(s, i, silence);
                } else if i > 0 {
                    mutate_to_note(s, i, distance, rng);
                }
            }
        }
    }
}

/// Replace slot `i` with a note a few semitones from its anchor: the last
/// note before it, or its own pitch when nothing precedes it. With no anchor
/// at all, or a step that leaves 0..=127, a pitch is drawn uniformly.
fn mutate_to_note(s: &mut Selection, i: usize, distance: u8, rng: &mut CantusRng) {
    let anchor = s.last_note(i).pitch().or_else(|| s.get(i).pitch());
    let pitch = match anchor {
        Some(anchor) => {
            let step = rng.range_i32_inclusive(1, i32::from(distance.max(1)));
            let candidate = if rng.coin() {
                i32::from(anchor) + step
            } else {
                i32::from(anchor) - step
            };
            if (0..=i32::from(MAX_PITCH)).contains(&candidate) {
                candidate
            } else {
                random_pitch(rng)
            }
        }
        None => random_pitch(rng),
    };
    s.set(i, Chunk::Note(pitch as u8));
}

/// Swap a hold for a rest or vice versa without letting the next slot's
/// hold change meaning.
fn flip_silence(s: &mut Selection, i: usize, current: Chunk) {
    let next_is_hold = i + 1 < s.len() && s.get(i + 1) == Chunk::Hold;
    match current {
        Chunk::Hold => {
            // The following hold would now extend a rest; re-attack the
            // note it was sustaining instead.
            if next_is_hold {
                let resumed = s.last_note(i);
                s.set(i + 1, resumed);
            }
            s.set(i, Chunk::Rest);
        }
        Chunk::Rest if i > 0 => {
            // The following hold would now extend sound; keep it silent.
            if next_is_hold {
                s.set(i + 1, Chunk::Rest);
            }
            s.set(i, Chunk::Hold);
        }
        _ => {}
    }
}

fn random_pitch(rng: &mut CantusRng) -> i32 {
    rng.range_i32_inclusive(0, i32::from(MAX_PITCH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(codes: &[i64]) -> Selection {
        Selection::from_codes(codes, 1).unwrap()
    }

    #[test]
    fn mask_forms_one_block_for_two_points() {
        let mut rng = CantusRng::new(4);
        for _ in 0..200 {
            let mask = crossover_mask(12, 2, &mut rng);
            let set: Vec<usize> = (0..12).filter(|&i| mask[i]).collect();
            assert!(set.len() >= 2);
            // Contiguous run from first to last set slot.
            assert_eq!(set.len(), set[set.len() - 1] - set[0] + 1);
        }
    }

    #[test]
    fn mask_with_more_points_than_slots() {
        let mut rng = CantusRng::new(4);
        assert_eq!(crossover_mask(1, 2, &mut rng), vec![true]);
        assert_eq!(crossover_mask(3, 5, &mut rng), vec![true, true, true]);
    }

    #[test]
    fn crossover_with_self_is_identity() {
        let mut rng = CantusRng::new(8);
        for _ in 0..100 {
            let p = Selection::random(10, 2, &mut rng);
            let (c1, c2) = crossover(&p, &p, 2, &mut rng);
            assert_eq!(c1, p);
            assert_eq!(c2, p);
        }
    }

    #[test]
    fn crossover_conserves_material() {
        let mut rng = CantusRng::new(21);
        let a = sel(&[60, 61, 62, 63, 64, 65]);
        let b = sel(&[70, 71, 72, 73, 74, 75]);
        for _ in 0..50 {
            let (c1, c2) = crossover(&a, &b, 2, &mut rng);
            assert_eq!(c1.len(), 6);
            assert_eq!(c2.len(), 6);
            for i in 0..6 {
                let pair = [c1.get(i), c2.get(i)];
                assert!(pair.contains(&a.get(i)) && pair.contains(&b.get(i)));
            }
        }
    }

    #[test]
    fn longer_tail_always_goes_to_first_child() {
        let mut rng = CantusRng::new(2);
        let short = sel(&[60, 61, 62]);
        let long = sel(&[70, 71, 72, 73, 74]);
        for _ in 0..200 {
            let (c1, c2) = crossover(&long, &short, 2, &mut rng);
            assert_eq!(c1.len(), 5);
            assert_eq!(c2.len(), 3);
            assert_eq!(&c1.codes()[3..], &[73, 74]);

            let (c1, c2) = crossover(&short, &long, 2, &mut rng);
            assert_eq!(c1.len(), 5);
            assert_eq!(c2.len(), 3);
            assert_eq!(&c1.codes()[3..], &[73, 74]);
        }
    }

    #[test]
    #[should_panic(expected = "chunk size")]
    fn crossover_rejects_mixed_resolutions() {
        let mut rng = CantusRng::new(0);
        let a = Selection::from_codes(&[60], 1).unwrap();
        let b = Selection::from_codes(&[60], 2).unwrap();
        crossover(&a, &b, 2, &mut rng);
    }

    #[test]
    fn zero_probability_mutation_is_noop() {
        let mut rng = CantusRng::new(10);
        for _ in 0..100 {
            let original = Selection::random(20, 1, &mut rng);
            let mut s = original.clone();
            mutate(&mut s, 0.0, 2, &mut rng);
            assert_eq!(s, original);
        }
    }

    #[test]
    fn mutation_preserves_invariants() {
        let mut rng = CantusRng::new(12);
        for _ in 0..300 {
            let mut s = Selection::random(16, 2, &mut rng);
            mutate(&mut s, 0.7, 2, &mut rng);
            assert_eq!(s.len(), 16);
            assert_ne!(s.get(0), Chunk::Hold);
            assert!(s.chunks().iter().all(|c| c.pitch().is_none_or(|p| p <= MAX_PITCH)));
        }
    }

    #[test]
    fn note_mutation_steps_from_previous_note() {
        let mut rng = CantusRng::new(13);
        for _ in 0..200 {
            let mut s = sel(&[64, 64]);
            mutate_to_note(&mut s, 1, 2, &mut rng);
            let p = s.get(1).pitch().unwrap();
            assert!([62, 63, 65, 66].contains(&p), "got {p}");
        }
    }

    #[test]
    fn note_mutation_redraws_off_the_keyboard() {
        let mut rng = CantusRng::new(14);
        for _ in 0..200 {
            let mut s = sel(&[127, 60]);
            mutate_to_note(&mut s, 1, 2, &mut rng);
            assert!(s.get(1).pitch().unwrap() <= MAX_PITCH);
        }
    }

    #[test]
    fn hold_to_rest_reattacks_following_hold() {
        let mut s = sel(&[67, 128, 128, 129]);
        flip_silence(&mut s, 1, Chunk::Hold);
        assert_eq!(s.codes(), vec![67, 129, 67, 129]);
    }

    #[test]
    fn rest_to_hold_silences_following_hold() {
        let mut s = sel(&[67, 129, 128, 60]);
        flip_silence(&mut s, 1, Chunk::Rest);
        assert_eq!(s.codes(), vec![67, 128, 129, 60]);
    }

    #[test]
    fn leading_rest_never_becomes_hold() {
        let mut s = sel(&[129, 60]);
        flip_silence(&mut s, 0, Chunk::Rest);
        assert_eq!(s.codes(), vec![129, 60]);
    }

    #[test]
    fn flip_at_last_slot_has_no_neighbour_to_guard() {
        let mut s = sel(&[60, 128]);
        flip_silence(&mut s, 1, Chunk::Hold);
        assert_eq!(s.codes(), vec![60, 129]);
    }
}
