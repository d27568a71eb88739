//! Line-window scope analysis.
//!
//! A call site is scoped when the lines around it mention a scope key as a
//! whole word or call a scope-resolution helper. This is a textual
//! heuristic: it accepts some false positives so that a call with no scope
//! evidence nearby is never missed.

use crate::models::CallSite;
use crate::utils::LineIndex;
use regex::Regex;

/// Lines inspected around a call site. `before` lines above catch scope
/// values resolved just ahead of the call; `after` lines below cover
/// multi-line argument objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub before: usize,
    pub after: usize,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            before: 5,
            after: 12,
        }
    }
}

impl WindowSize {
    /// Inclusive 1-indexed line range for a call on `line`, clamped to
    /// `line_count`.
    pub fn bounds(&self, line: usize, line_count: usize) -> (usize, usize) {
        let first = line.saturating_sub(self.before).max(1);
        let last = line.saturating_add(self.after).min(line_count.max(1));
        (first, last)
    }
}

/// Recognizes scope evidence in text: scope keys and helper calls.
#[derive(Debug, Clone)]
pub struct ScopeMatcher {
    keys: Vec<String>,
    helpers: Vec<String>,
    key_re: Regex,
    helper_re: Option<Regex>,
}

impl ScopeMatcher {
    pub fn new(keys: &[String], helpers: &[String]) -> Result<Self, regex::Error> {
        let key_re = Regex::new(&format!(r"\b(?:{})\b", alternation(keys)))?;
        let helper_re = if helpers.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"\b(?:{})\s*\(", alternation(helpers)))?)
        };
        Ok(Self {
            keys: keys.to_vec(),
            helpers: helpers.to_vec(),
            key_re,
            helper_re,
        })
    }

    /// Whole-word occurrence of any scope key.
    pub fn mentions_key(&self, text: &str) -> bool {
        self.key_re.is_match(text)
    }

    /// Call to any scope-resolution helper.
    pub fn calls_helper(&self, text: &str) -> bool {
        self.helper_re.as_ref().is_some_and(|re| re.is_match(text))
    }

    pub fn has_evidence(&self, text: &str) -> bool {
        self.mentions_key(text) || self.calls_helper(text)
    }

    pub fn is_key(&self, ident: &str) -> bool {
        self.keys.iter().any(|k| k == ident)
    }

    pub fn is_helper(&self, name: &str) -> bool {
        self.helpers.iter().any(|h| h == name)
    }
}

fn alternation(words: &[String]) -> String {
    let parts: Vec<String> = words
        .iter()
        .filter(|w| !w.is_empty())
        .map(|w| regex::escape(w))
        .collect();
    if parts.is_empty() {
        // Matches nothing.
        "[^\\s\\S]".to_string()
    } else {
        parts.join("|")
    }
}

/// Decide whether `call` is scoped by inspecting its line window.
///
/// Raw queries use the same test: the query text and its neighbours are
/// searched directly since there is no argument object to inspect.
pub fn is_scoped(
    call: &CallSite,
    lines: &LineIndex<'_>,
    size: WindowSize,
    matcher: &ScopeMatcher,
) -> bool {
    let (first, last) = size.bounds(call.location.line, lines.line_count());
    let text = lines.span_text(first, last);
    let scoped = matcher.has_evidence(text);
    tracing::debug!(
        file = %call.location.file,
        line = call.location.line,
        first,
        last,
        scoped,
        "window check"
    );
    scoped
}
