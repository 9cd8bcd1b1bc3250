// Reference corpus loading.
//
// A corpus is described by a manifest: a text file listing one melody file
// per line. Each melody file holds whitespace-separated integers, the first
// being the chunk size and the rest the chunk codes (0..=127 pitch, 128 hold,
// 129 rest). Line breaks inside a melody file carry no meaning; they only
// show up in parse error messages.
//
// Relative paths in a manifest resolve against the manifest's directory, so
// a corpus folder can be moved as a unit. Blank lines and `#` comments are
// skipped.

use crate::error::{CantusError, Result};
use crate::selection::Selection;
use std::path::{Path, PathBuf};

/// Parse one melody file's contents. `source_name` only labels errors.
pub fn parse_selection(text: &str, source_name: &str) -> Result<Selection> {
    let mut numbers = Vec::new();
    for (line_index, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let value = token.parse::<i64>().map_err(|_| CantusError::Parse {
                source_name: source_name.to_string(),
                line: line_index + 1,
                token: token.to_string(),
            })?;
            numbers.push(value);
        }
    }

    let Some((&chunk_size, codes)) = numbers.split_first() else {
        return Err(CantusError::MissingChunkSize {
            source_name: source_name.to_string(),
        });
    };
    Selection::from_codes(codes, chunk_size)
}

pub fn load_selection(path: &Path) -> Result<Selection> {
    let text = std::fs::read_to_string(path).map_err(|e| CantusError::io(path, e))?;
    parse_selection(&text, &path.display().to_string())
}

/// Melody file paths listed in a manifest, in order.
pub fn read_manifest(path: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).map_err(|e| CantusError::io(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(manifest_entries(&text)
        .map(|entry| {
            let entry = Path::new(entry);
            if entry.is_absolute() {
                entry.to_path_buf()
            } else {
                base.join(entry)
            }
        })
        .collect())
}

fn manifest_entries(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Load every melody a manifest lists. Fails on the first bad file, and on a
/// manifest that lists nothing.
pub fn load_corpus(manifest: &Path) -> Result<Vec<Selection>> {
    let paths = read_manifest(manifest)?;
    if paths.is_empty() {
        return Err(CantusError::EmptyCorpus);
    }
    paths.iter().map(|p| load_selection(p)).collect()
}
