// Textual MIDI event trace.
//
// Renders a melody as the line-oriented text format that `t2mf`-style
// assemblers turn into a Standard MIDI File: a conductor track with 4/4 time
// and a 100 bpm tempo, then a single "Piano" track of On/Off pairs. This crate
// never writes binary MIDI itself.
//
// Timing uses 96 ticks per quarter note at 25 ticks per sixteenth, so one
// slot lasts `25 * 16 / chunk_size` ticks (integer division). The clock
// starts one slot in. A note's Off event lands after the note and all the
// holds following it; a rest and its holds advance the clock silently.

use crate::error::{CantusError, Result};
use crate::selection::{Chunk, Selection};
use std::fmt::Write as _;
use std::path::Path;

/// Ticks in a quarter note, declared in the `MFile` header.
const TICKS_PER_QUARTER: u32 = 96;

/// Ticks in one sixteenth note as the trace counts them.
const TICKS_PER_SIXTEENTH: u32 = 25;

const VELOCITY: u8 = 70;

/// Ticks one slot occupies at `chunk_size` slots per unit.
pub fn ticks_per_chunk(chunk_size: u32) -> u32 {
    TICKS_PER_SIXTEENTH * 16 / chunk_size
}

/// Render the full trace for `s` with `song_name` as the conductor track name.
pub fn render_event_trace(s: &Selection, song_name: &str) -> String {
    let mut out = String::new();
    // Writing into a String never fails.
    let _ = write_trace(&mut out, s, song_name);
    out
}

fn write_trace(out: &mut String, s: &Selection, song_name: &str) -> std::fmt::Result {
    writeln!(out, "MFile 1 2 {TICKS_PER_QUARTER}")?;
    writeln!(out, "MTrk")?;
    writeln!(out, "0 TimeSig 4/4 24 8")?;
    writeln!(out, "0 KeySig 0 major")?;
    writeln!(out, "0 Tempo 600000")?;
    writeln!(out, "0 Meta TrkName \"{song_name}\"")?;
    writeln!(out, "1 Meta TrkEnd")?;
    writeln!(out, "TrkEnd")?;
    writeln!(out, "MTrk")?;
    writeln!(out, "0 Meta TrkName \"Piano\"")?;

    let step = ticks_per_chunk(s.chunk_size());
    let chunks = s.chunks();
    let mut clock = step;
    let mut i = 0;
    while i < chunks.len() {
        let sounding = chunks[i].pitch();
        if let Some(p) = sounding {
            writeln!(out, "{clock} On ch=1 n={p} v={VELOCITY}")?;
        }
        // Consume this slot and every hold continuing it.
        loop {
            i += 1;
            clock += step;
            if i >= chunks.len() || chunks[i] != Chunk::Hold {
                break;
            }
        }
        if let Some(p) = sounding {
            writeln!(out, "{clock} Off ch=1 n={p} v={VELOCITY}")?;
        }
    }

    writeln!(out, "{} Meta TrkEnd", clock + 1)?;
    writeln!(out, "TrkEnd")
}

pub fn write_event_trace(s: &Selection, song_name: &str, path: &Path) -> Result<()> {
    std::fs::write(path, render_event_trace(s, song_name)).map_err(|e| CantusError::io(path, e))
}
