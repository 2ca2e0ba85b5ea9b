//! Source-context rendering for the console: a small window of lines
//! around the current stop, with the current line marked.

use crate::debugger::dwarf::Place;
use crate::debugger::error::Error;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::{fs, io};

/// How many lines of context to print above and below the current line
/// (scenario S1: "source printed with `> ` on line 5").
const CONTEXT_LINES: u64 = 2;

/// Caches source files by path so repeated stops in the same file don't
/// re-read it from disk.
pub struct SourceView {
    cached_lines: RefCell<HashMap<PathBuf, Box<[String]>>>,
}

impl SourceView {
    pub fn new() -> Self {
        Self {
            cached_lines: RefCell::default(),
        }
    }

    /// Render `CONTEXT_LINES` lines of source above and below `place`'s
    /// line, each prefixed with its 1-based line number; the current
    /// line is marked with `> ` instead of the usual two-space indent.
    pub fn render(&self, place: &Place<'_>) -> Result<String, Error> {
        let line_number = place.line_number.max(1);
        let line_pos = line_number - 1;
        let start = line_pos.saturating_sub(CONTEXT_LINES);

        let mut cache = self.cached_lines.borrow_mut();
        let path = PathBuf::from(place.file);
        let file_lines = match cache.get(&path) {
            Some(lines) => lines,
            None => {
                let file = fs::File::open(&path)?;
                let lines: Vec<String> = io::BufReader::new(file).lines().map_while(Result::ok).collect();
                cache.insert(path.clone(), lines.into_boxed_slice());
                cache.get(&path).unwrap()
            }
        };

        let mut out = String::new();
        for (pos, text) in file_lines
            .iter()
            .enumerate()
            .skip(start as usize)
            .take((CONTEXT_LINES * 2 + 1) as usize)
        {
            let this_line = pos as u64 + 1;
            let marker = if this_line == line_number { "> " } else { "  " };
            out.push_str(&format!("{marker}{this_line} {text}\n"));
        }
        Ok(out)
    }
}

impl Default for SourceView {
    fn default() -> Self {
        Self::new()
    }
}
