// The chromosome: one melody as a flat run of time slots.
//
// A `Selection` is a sequence of `Chunk`s plus a `chunk_size`, the number of
// slots per quarter note. Each slot either attacks a MIDI pitch, holds the
// previous sound, or rests. Durations are therefore implicit: a quarter-note
// C4 at chunk size 2 is `[Note(60), Hold]`.
//
// Invariants every constructor and operator maintains:
// - at least one chunk;
// - the first chunk is never `Hold` (a hold must continue something);
// - note pitches are in 0..=127.
//
// The corpus file format and the population dump use integer codes for the
// same alphabet: 0..=127 for pitches, 128 for HOLD, 129 for REST.
//
// Genetic operators live in `operators.rs`; this module only owns the
// representation and its structural edits (equalization, transposition,
// repair).

use crate::error::{CantusError, Result};
use cantus_prng::CantusRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest valid MIDI pitch.
pub const MAX_PITCH: u8 = 127;
/// Integer code for `Chunk::Hold` in corpus files.
pub const HOLD_CODE: u8 = 128;
/// Integer code for `Chunk::Rest` in corpus files.
pub const REST_CODE: u8 = 129;
/// Number of distinct chunk codes (128 pitches, HOLD, REST).
pub const ALPHABET_SIZE: usize = 130;
/// Largest `target / chunk_size` ratio `equalize` accepts.
pub const MAX_STRETCH: u32 = 64;

/// One time slot of a melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chunk {
    /// Attack of a MIDI pitch.
    Note(u8),
    /// Continue whatever sounded (or rested) in the previous slot.
    Hold,
    /// Silence.
    Rest,
}

impl Chunk {
    /// Decode a corpus integer code.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0..=127 => Ok(Chunk::Note(code as u8)),
            128 => Ok(Chunk::Hold),
            129 => Ok(Chunk::Rest),
            _ => Err(CantusError::InvalidChunkCode { code }),
        }
    }

    /// Integer code, the inverse of `from_code`.
    pub fn code(self) -> u8 {
        match self {
            Chunk::Note(p) => p,
            Chunk::Hold => HOLD_CODE,
            Chunk::Rest => REST_CODE,
        }
    }

    pub fn is_note(self) -> bool {
        matches!(self, Chunk::Note(_))
    }

    pub fn pitch(self) -> Option<u8> {
        match self {
            Chunk::Note(p) => Some(p),
            _ => None,
        }
    }

    /// Draw uniformly over the whole alphabet.
    fn random(rng: &mut CantusRng) -> Self {
        match rng.range_usize(0, ALPHABET_SIZE) {
            n if n < HOLD_CODE as usize => Chunk::Note(n as u8),
            n if n == HOLD_CODE as usize => Chunk::Hold,
            _ => Chunk::Rest,
        }
    }
}

/// A candidate or reference melody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    chunks: Vec<Chunk>,
    chunk_size: u32,
}

impl Selection {
    /// A melody of `len` slots drawn uniformly over the alphabet. The first
    /// slot is redrawn until it is not a hold.
    pub fn random(len: usize, chunk_size: u32, rng: &mut CantusRng) -> Self {
        assert!(len > 0, "Selection::random: length must be positive");
        assert!(chunk_size > 0, "Selection::random: chunk size must be positive");
        let mut chunks = Vec::with_capacity(len);
        let first = loop {
            let c = Chunk::random(rng);
            if c != Chunk::Hold {
                break c;
            }
        };
        chunks.push(first);
        for _ in 1..len {
            chunks.push(Chunk::random(rng));
        }
        Selection { chunks, chunk_size }
    }

    /// Wrap an already-built chunk sequence as is.
    ///
    /// Panics on an empty sequence or a zero chunk size; operators only call
    /// this with sequences derived from valid selections.
    pub fn from_chunks(chunks: Vec<Chunk>, chunk_size: u32) -> Self {
        assert!(!chunks.is_empty(), "Selection::from_chunks: empty sequence");
        assert!(chunk_size > 0, "Selection::from_chunks: zero chunk size");
        Selection { chunks, chunk_size }
    }

    /// Build from corpus integer codes, validating every invariant.
    pub fn from_codes(codes: &[i64], chunk_size: i64) -> Result<Self> {
        if chunk_size <= 0 || chunk_size > i64::from(u32::MAX) {
            return Err(CantusError::InvalidChunkSize { chunk_size });
        }
        if codes.is_empty() {
            return Err(CantusError::EmptySelection);
        }
        let chunks = codes
            .iter()
            .map(|&c| Chunk::from_code(c))
            .collect::<Result<Vec<_>>>()?;
        if chunks[0] == Chunk::Hold {
            return Err(CantusError::LeadingHold);
        }
        Ok(Selection {
            chunks,
            chunk_size: chunk_size as u32,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always false for a constructed selection; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The melody as corpus integer codes.
    pub fn codes(&self) -> Vec<u8> {
        self.chunks.iter().map(|c| c.code()).collect()
    }

    /// Chunk at `index`. Panics when out of range.
    pub fn get(&self, index: usize) -> Chunk {
        self.chunks[index]
    }

    /// Overwrite the chunk at `index`. Panics when out of range.
    pub fn set(&mut self, index: usize, chunk: Chunk) {
        assert!(
            index < self.chunks.len(),
            "Selection::set: index {index} out of range for length {}",
            self.chunks.len()
        );
        self.chunks[index] = chunk;
    }

    /// The nearest note strictly before `index`, or `Chunk::Rest` when no
    /// note precedes it.
    pub fn last_note(&self, index: usize) -> Chunk {
        self.chunks[..index.min(self.chunks.len())]
            .iter()
            .rev()
            .copied()
            .find(|c| c.is_note())
            .unwrap_or(Chunk::Rest)
    }

    pub fn first_note_index(&self) -> Option<usize> {
        self.chunks.iter().position(|c| c.is_note())
    }

    pub fn first_pitch(&self) -> Option<u8> {
        self.first_note_index().and_then(|i| self.chunks[i].pitch())
    }

    pub fn has_note(&self) -> bool {
        self.first_note_index().is_some()
    }

    /// Copy with every note moved by `offset` semitones; holds and rests are
    /// untouched. A pitch pushed outside 0..=127 is folded back by whole
    /// octaves, which keeps its pitch class.
    pub fn transposed(&self, offset: i32) -> Selection {
        let chunks = self
            .chunks
            .iter()
            .map(|&c| match c {
                Chunk::Note(p) => Chunk::Note(fold_into_range(i32::from(p) + offset)),
                other => other,
            })
            .collect();
        Selection {
            chunks,
            chunk_size: self.chunk_size,
        }
    }

    /// Stretch to a finer resolution by inserting `ratio - 1` holds after
    /// every slot, where `ratio = target / chunk_size`. Real durations are
    /// preserved; nothing is removed or reordered. Ratios above
    /// `MAX_STRETCH` are rejected.
    pub fn equalize(&mut self, target: u32) -> Result<()> {
        if target < self.chunk_size || target % self.chunk_size != 0 {
            return Err(CantusError::IncompatibleChunkSize {
                from: self.chunk_size,
                to: target,
            });
        }
        if target / self.chunk_size > MAX_STRETCH {
            return Err(CantusError::StretchTooLarge {
                from: self.chunk_size,
                to: target,
                limit: MAX_STRETCH,
            });
        }
        let ratio = (target / self.chunk_size) as usize;
        if ratio > 1 {
            let mut stretched = Vec::with_capacity(self.chunks.len() * ratio);
            for &c in &self.chunks {
                stretched.push(c);
                stretched.extend(std::iter::repeat_n(Chunk::Hold, ratio - 1));
            }
            self.chunks = stretched;
        }
        self.chunk_size = target;
        Ok(())
    }

    /// Restore the representation invariants in place: note pitches above
    /// 127 are clamped to 127 and a leading hold becomes a rest. Returns the
    /// number of slots rewritten.
    pub fn repair(&mut self) -> usize {
        let mut fixed = 0;
        for c in &mut self.chunks {
            if matches!(c, Chunk::Note(p) if *p > MAX_PITCH) {
                *c = Chunk::Note(MAX_PITCH);
                fixed += 1;
            }
        }
        if self.chunks.first() == Some(&Chunk::Hold) {
            self.chunks[0] = Chunk::Rest;
            fixed += 1;
        }
        fixed
    }
}

impl fmt::Display for Selection {
    /// Bracketed code list, e.g. `[60, 128, 62, 129]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, c) in self.chunks.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", c.code())?;
        }
        f.write_str("]")
    }
}

fn fold_into_range(pitch: i32) -> u8 {
    let mut p = pitch;
    while p < 0 {
        p += 12;
    }
    while p > i32::from(MAX_PITCH) {
        p -= 12;
    }
    p as u8
}
