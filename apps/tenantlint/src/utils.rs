//! Supporting helpers: colored message prefixes, path display, and line
//! lookups over source text.

use owo_colors::OwoColorize;
use std::path::Path;

fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

pub fn error_prefix() -> String {
    if color_enabled() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if color_enabled() {
        "note:".cyan().bold().to_string()
    } else {
        "note:".to_string()
    }
}

pub fn info_prefix() -> String {
    if color_enabled() {
        "info:".blue().bold().to_string()
    } else {
        "info:".to_string()
    }
}

/// Render `path` relative to `root` with forward slashes.
pub fn display_path(path: &Path, root: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() {
        ".".to_string()
    } else {
        s
    }
}

/// Byte offsets of line starts, for offset <-> line/column conversion.
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { text, starts }
    }

    pub fn line_count(&self) -> usize {
        // A trailing newline does not open a new line.
        match self.starts.last() {
            Some(&last) if last == self.text.len() && self.starts.len() > 1 => self.starts.len() - 1,
            _ => self.starts.len(),
        }
    }

    /// 1-indexed line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// 1-indexed byte column of `offset` within its line.
    pub fn column_of(&self, offset: usize) -> usize {
        let line = self.line_of(offset);
        offset - self.starts[line - 1] + 1
    }

    /// Byte offset of the start of 1-indexed `line`.
    pub fn line_start(&self, line: usize) -> usize {
        self.starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or(self.text.len())
    }

    /// Text of 1-indexed `line` without its line terminator.
    pub fn line_text(&self, line: usize) -> &'a str {
        if line == 0 || line > self.starts.len() {
            return "";
        }
        let start = self.starts[line - 1];
        let end = self
            .starts
            .get(line)
            .map(|s| s.saturating_sub(1))
            .unwrap_or(self.text.len());
        self.text[start..end].trim_end_matches('\r')
    }

    /// Text spanning lines `first..=last` (1-indexed, clamped).
    pub fn span_text(&self, first: usize, last: usize) -> &'a str {
        let count = self.line_count();
        let first = first.max(1);
        let last = last.min(count);
        if first > last {
            return "";
        }
        let start = self.starts[first - 1];
        let end = self.starts.get(last).copied().unwrap_or(self.text.len());
        &self.text[start..end]
    }
}
