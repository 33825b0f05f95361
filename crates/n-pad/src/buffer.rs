//! Text buffer — the live document both engines read from.
//!
//! A `Buffer` wraps a [`ropey::Rope`] with char-offset editing and a
//! **revision counter** that increases on every mutation. The engines never
//! hold the buffer; they borrow it through [`TextSource`] for the duration of
//! one operation, so neither keeps a persistent copy of the document.
//!
//! # Design choices
//!
//! - **ropey** gives O(log n) insert/remove at any offset and correct Unicode
//!   handling. We build a small API on top rather than reimplementing it.
//!
//! - **Offsets are char offsets**, not byte offsets. Offset 3 of `"café"` is
//!   `'é'`. Byte offsets never leak into the public API.
//!
//! - **No undo/redo here.** Edit history belongs to the host.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;

use ropey::Rope;

// ---------------------------------------------------------------------------
// TextSource
// ---------------------------------------------------------------------------

/// Read access to a document.
///
/// This is the only capability the autosave and search engines need. The
/// [`revision`](Self::revision) lets the autosave engine remember which
/// version of the text reached the disk.
pub trait TextSource {
    /// The full document text.
    fn text(&self) -> Cow<'_, str>;

    /// A counter that changes whenever the text changes. Sources that never
    /// change may keep the default of 0.
    fn revision(&self) -> u64 {
        0
    }
}

impl TextSource for str {
    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl TextSource for String {
    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// A text buffer backed by a rope.
///
/// All offsets are char indices into the whole document. Editing methods
/// return `false` and leave the buffer untouched when given an offset past
/// the end, so a stale offset from the host never panics.
pub struct Buffer {
    rope: Rope,
    revision: u64,
}

impl Buffer {
    // -- Construction -------------------------------------------------------

    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            revision: 0,
        }
    }

    /// Create a buffer from a string.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            revision: 0,
        }
    }

    /// Load a buffer from a UTF-8 file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid UTF-8.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    // -- Text access --------------------------------------------------------

    /// Total character count (Unicode scalar values, not bytes).
    #[inline]
    #[must_use]
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// True when the buffer contains no text.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Total number of lines. An empty buffer has 1 line.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Collect all text into a `String`.
    #[must_use]
    pub fn contents(&self) -> String {
        self.rope.to_string()
    }

    /// The current revision. Starts at 0 and increases on every edit.
    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    // -- Editing ------------------------------------------------------------

    /// Insert text at a char offset. Returns `false` if the offset is past
    /// the end of the buffer.
    pub fn insert(&mut self, char_idx: usize, text: &str) -> bool {
        if char_idx > self.rope.len_chars() {
            return false;
        }
        if !text.is_empty() {
            self.rope.insert(char_idx, text);
            self.revision += 1;
        }
        true
    }

    /// Remove the chars in `range`. Returns `false` if the range is inverted
    /// or reaches past the end of the buffer.
    pub fn remove(&mut self, range: Range<usize>) -> bool {
        if range.start > range.end || range.end > self.rope.len_chars() {
            return false;
        }
        if !range.is_empty() {
            self.rope.remove(range);
            self.revision += 1;
        }
        true
    }

    /// Replace the whole document.
    pub fn replace_all(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.revision += 1;
    }
}

impl TextSource for Buffer {
    fn text(&self) -> Cow<'_, str> {
        Cow::Owned(self.rope.to_string())
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lines", &self.line_count())
            .field("chars", &self.len_chars())
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
