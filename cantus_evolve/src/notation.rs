// Human-readable note names for a melody.
//
// Lowercase pitch-class names with sharps (c, c#, d, ... b) followed by the
// octave number `pitch / 12`, so MIDI 60 is "c5" in this scheme. Holds print
// as "h" and rests as "r". Every token is followed by ", ", matching the
// transcription format downstream tools already parse.

use crate::selection::{Chunk, Selection};

const PITCH_CLASS_NAMES: [&str; 12] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b",
];

/// Name of a MIDI pitch, e.g. 61 -> "c#5".
pub fn note_name(pitch: u8) -> String {
    let class = pitch % 12;
    format!("{}{}", PITCH_CLASS_NAMES[class as usize], (pitch - class) / 12)
}

fn chunk_token(chunk: Chunk) -> String {
    match chunk {
        Chunk::Note(p) => note_name(p),
        Chunk::Hold => "h".to_string(),
        Chunk::Rest => "r".to_string(),
    }
}

/// Transcribe a melody, e.g. `[60, 128, 62, 129]` -> "c5, h, d5, r, ".
pub fn to_note_names(s: &Selection) -> String {
    let mut out = String::new();
    for &chunk in s.chunks() {
        out.push_str(&chunk_token(chunk));
        out.push_str(", ");
    }
    out
}
