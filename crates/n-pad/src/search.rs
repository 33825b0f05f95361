//! Search — literal find-next / find-previous with match highlighting.
//!
//! Queries are **literal, case-sensitive** substrings. There is no pattern
//! syntax: `a.c` matches the three characters `a`, `.`, `c` and nothing
//! else. An empty query never matches and is rejected before any scan.
//!
//! # Search flow
//!
//! 1. The host forwards the search-box text on Enter ([`SearchEngine::find_next`])
//!    or Shift+Enter ([`SearchEngine::find_prev`]).
//! 2. The engine looks from its cursor toward the end (or start) of the
//!    document and wraps around once if nothing is found in that direction.
//! 3. On a hit the cursor moves, the match becomes the selection and the only
//!    member of the Match Set, and the returned [`SearchHit`] tells the host
//!    what to scroll into view.
//!
//! # Match highlighting
//!
//! [`SearchEngine::highlight_all`] tags every non-overlapping occurrence.
//! After a match the scan resumes at the match's end, so `"aa"` in `"aaa"`
//! is one match, not two.
//!
//! All offsets are char offsets into the whole document.

use std::ops::Range;

use tracing::trace;

use crate::buffer::TextSource;
use crate::error::SearchError;
use crate::position::Position;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Search direction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SearchDirection {
    Forward,
    Backward,
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A search match: the half-open char range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

impl Match {
    /// Create a match. `start` must not exceed `end`.
    #[inline]
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "Match::new requires start <= end");
        Self { start, end }
    }

    /// Length in chars.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.start
    }

    /// True for a zero-width match (never produced by a search).
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// The match as a `Range`.
    #[inline]
    #[must_use]
    pub const fn range(self) -> Range<usize> {
        self.start..self.end
    }
}

/// A successful navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// The matched text, now selected and highlighted.
    pub range: Match,
    /// The new cursor offset: match end going forward, match start going
    /// backward.
    pub cursor: usize,
    /// Where the match starts, for the host to scroll into view.
    pub position: Position,
    /// The search ran off one end of the document and continued from the
    /// other.
    pub wrapped: bool,
}

// ---------------------------------------------------------------------------
// Search functions
// ---------------------------------------------------------------------------

/// Find the first match of `query` starting at or after char offset `from`.
///
/// Wraps around: if nothing starts at or after `from`, the first match in the
/// document is returned.
#[must_use]
pub fn find_forward(text: &str, query: &str, from: usize) -> Option<Match> {
    if query.is_empty() {
        return None;
    }
    let from_byte = char_to_byte(text, from);
    let byte = text[from_byte..]
        .find(query)
        .map(|idx| from_byte + idx)
        .or_else(|| text.find(query))?;
    Some(match_at(text, byte, query))
}

/// Find the last match of `query` starting strictly before char offset
/// `before`.
///
/// Wraps around: if nothing starts before `before`, the last match in the
/// document is returned.
#[must_use]
pub fn find_backward(text: &str, query: &str, before: usize) -> Option<Match> {
    if query.is_empty() {
        return None;
    }
    let limit = char_to_byte(text, before);
    let byte = last_start_before(text, query, limit).or_else(|| text.rfind(query))?;
    Some(match_at(text, byte, query))
}

/// Find the next match in the given direction.
#[must_use]
pub fn find(text: &str, query: &str, cursor: usize, direction: SearchDirection) -> Option<Match> {
    match direction {
        SearchDirection::Forward => find_forward(text, query, cursor),
        SearchDirection::Backward => find_backward(text, query, cursor),
    }
}

/// Find every non-overlapping match of `query`, in document order.
#[must_use]
pub fn find_all(text: &str, query: &str) -> Vec<Match> {
    if query.is_empty() {
        return Vec::new();
    }

    let query_chars = query.chars().count();
    let mut matches = Vec::new();
    let mut seen_byte = 0;
    let mut seen_char = 0;

    // `match_indices` resumes after each match's end (non-overlapping).
    for (byte, _) in text.match_indices(query) {
        seen_char += text[seen_byte..byte].chars().count();
        seen_byte = byte;
        matches.push(Match::new(seen_char, seen_char + query_chars));
    }

    matches
}

// ---------------------------------------------------------------------------
// SearchEngine
// ---------------------------------------------------------------------------

/// Cursor, selection and Match Set for one document.
///
/// The engine never stores the text. Each command borrows the document
/// through [`TextSource`] for the duration of the call.
#[derive(Debug, Default)]
pub struct SearchEngine {
    cursor: usize,
    selection: Option<Match>,
    matches: Vec<Match>,
    status: String,
}

impl SearchEngine {
    /// Create an engine with the cursor at the document start.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Accessors ----------------------------------------------------------

    /// The cursor offset.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, e.g. when the user clicks in the text.
    #[inline]
    pub const fn set_cursor(&mut self, offset: usize) {
        self.cursor = offset;
    }

    /// The match selected by the last successful navigation.
    #[inline]
    #[must_use]
    pub const fn selection(&self) -> Option<Match> {
        self.selection
    }

    /// The Match Set: every range currently tagged as a hit.
    #[inline]
    #[must_use]
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Status text of the last command.
    #[inline]
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    // -- Commands -----------------------------------------------------------

    /// Tag every non-overlapping occurrence of `query` and return the count.
    ///
    /// The previous Match Set is replaced. Finding nothing is `Ok(0)`.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyQuery`] for an empty query. The Match Set is
    /// cleared and no scan happens.
    pub fn highlight_all<T: TextSource + ?Sized>(
        &mut self,
        text: &T,
        query: &str,
    ) -> Result<usize, SearchError> {
        self.matches.clear();
        if query.is_empty() {
            return Err(self.fail(SearchError::EmptyQuery));
        }

        self.matches = find_all(&text.text(), query);
        let count = self.matches.len();
        trace!(query, count, "highlight all");

        self.status = match count {
            0 => SearchError::NotFound.to_string(),
            1 => "1 match highlighted".to_string(),
            n => format!("{n} matches highlighted"),
        };
        Ok(count)
    }

    /// Jump to the next occurrence at or after the cursor, wrapping to the
    /// document start. The cursor lands on the match end.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyQuery`] or [`SearchError::NotFound`]; the cursor
    /// does not move in either case.
    pub fn find_next<T: TextSource + ?Sized>(
        &mut self,
        text: &T,
        query: &str,
    ) -> Result<SearchHit, SearchError> {
        self.navigate(text, query, SearchDirection::Forward)
    }

    /// Jump to the previous occurrence before the cursor, wrapping to the
    /// document end. The cursor lands on the match start.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyQuery`] or [`SearchError::NotFound`]; the cursor
    /// does not move in either case.
    pub fn find_prev<T: TextSource + ?Sized>(
        &mut self,
        text: &T,
        query: &str,
    ) -> Result<SearchHit, SearchError> {
        self.navigate(text, query, SearchDirection::Backward)
    }

    /// Remove all match tags. The cursor and selection stay put.
    pub fn clear_highlight(&mut self) {
        self.matches.clear();
        self.status = "highlights cleared".to_string();
    }

    // -- Internals ----------------------------------------------------------

    fn navigate<T: TextSource + ?Sized>(
        &mut self,
        text: &T,
        query: &str,
        direction: SearchDirection,
    ) -> Result<SearchHit, SearchError> {
        if query.is_empty() {
            return Err(self.fail(SearchError::EmptyQuery));
        }
        self.matches.clear();

        let text = text.text();
        // The document may have shrunk since the cursor was last set.
        let cursor = self.cursor.min(text.chars().count());

        let Some(found) = find(&text, query, cursor, direction) else {
            trace!(query, ?direction, "no match");
            return Err(self.fail(SearchError::NotFound));
        };

        let (cursor, wrapped) = match direction {
            SearchDirection::Forward => (found.end, found.start < cursor),
            SearchDirection::Backward => (found.start, found.start >= cursor),
        };
        self.cursor = cursor;
        self.selection = Some(found);
        self.matches.push(found);

        let position = Position::of_offset(&text, found.start);
        self.status = if wrapped {
            format!("moved to {position} (wrapped)")
        } else {
            format!("moved to {position}")
        };
        trace!(query, ?direction, start = found.start, wrapped, "match");

        Ok(SearchHit {
            range: found,
            cursor,
            position,
            wrapped,
        })
    }

    fn fail(&mut self, err: SearchError) -> SearchError {
        self.status = err.to_string();
        err
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Byte offset of the last `query` occurrence that starts before
/// `limit_byte`.
fn last_start_before(text: &str, query: &str, limit_byte: usize) -> Option<usize> {
    if limit_byte == 0 {
        return None;
    }
    // A match starting at `limit_byte - 1` ends at most here.
    let mut end = (limit_byte - 1 + query.len()).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].rfind(query)
}

/// Build the char-offset match for a hit at `byte`.
fn match_at(text: &str, byte: usize, query: &str) -> Match {
    let start = byte_to_char(text, byte);
    Match::new(start, start + query.chars().count())
}

/// Convert a char offset to a byte offset, clamping past the end.
fn char_to_byte(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map_or(s.len(), |(b, _)| b)
}

/// Convert a byte offset to a char offset.
fn byte_to_char(s: &str, byte_offset: usize) -> usize {
    s[..byte_offset].chars().count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
