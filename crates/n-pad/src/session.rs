//! Session — one open document with autosave and search attached.
//!
//! The window layer talks to a [`Session`] and nothing else. Every mutation
//! goes through it, so the autosave engine hears about each edit; search
//! commands go to the search engine; both report into a single status line.
//! The two engines never see each other.
//!
//! ```text
//!   host ──insert/remove──▶ Session ──▶ Buffer
//!                              │  └────▶ AutosaveEngine::notify_changed
//!   host ──find_next───────▶   ├───────▶ SearchEngine
//!   host loop ──tick───────▶   └───────▶ AutosaveEngine::poll
//! ```

use std::env;
use std::fmt::Write as _;
use std::mem;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::autosave::{AutosaveEngine, SaveOutcome, SaveTarget};
use crate::buffer::Buffer;
use crate::error::{OpenError, OptionError, SaveError, SearchError};
use crate::options::{Options, parse_set};
use crate::search::{SearchEngine, SearchHit};
use crate::storage::{FsStorage, Storage};
use crate::timer::{Clock, SystemClock};

/// Application name shown in the title.
pub const APP_NAME: &str = "n-pad";

/// The live document and its engines.
#[derive(Debug)]
pub struct Session<C: Clock + Clone = SystemClock, S: Storage + Clone = FsStorage> {
    buffer: Buffer,
    autosave: AutosaveEngine<C, S>,
    search: SearchEngine,
    options: Options,
    /// Directory the fallback file lives in.
    fallback_dir: PathBuf,
    clock: C,
    storage: S,
    status: String,
}

impl Session {
    /// A session on the real clock and filesystem, with the fallback file in
    /// the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::WorkingDir`] if the working directory cannot be
    /// resolved.
    pub fn new() -> Result<Self, SaveError> {
        let dir = env::current_dir().map_err(SaveError::WorkingDir)?;
        Ok(Self::with_parts(dir, SystemClock, FsStorage))
    }
}

impl<C: Clock + Clone, S: Storage + Clone> Session<C, S> {
    /// A session with an explicit fallback directory, clock and storage.
    #[must_use]
    pub fn with_parts(fallback_dir: impl Into<PathBuf>, clock: C, storage: S) -> Self {
        let fallback_dir = fallback_dir.into();
        let options = Options::default();
        let target = SaveTarget::Fallback(fallback_dir.join(&options.autosave_file));
        let autosave = configure(
            AutosaveEngine::new(target, clock.clone(), storage.clone()),
            &options,
        );
        Self {
            buffer: Buffer::new(),
            autosave,
            search: SearchEngine::new(),
            options,
            fallback_dir,
            clock,
            storage,
            status: "ready".to_string(),
        }
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[inline]
    #[must_use]
    pub const fn autosave(&self) -> &AutosaveEngine<C, S> {
        &self.autosave
    }

    #[inline]
    #[must_use]
    pub const fn search(&self) -> &SearchEngine {
        &self.search
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// The status line text.
    #[inline]
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Edits have not reached the disk yet. The host asks before
    /// discarding the document or quitting.
    #[must_use]
    pub const fn has_unsaved_changes(&self) -> bool {
        self.autosave.is_dirty()
    }

    /// Window title: `n-pad - <file>[ *] [(last saved HH:MM:SS)|(save failed)]`.
    #[must_use]
    pub fn title(&self) -> String {
        let mut title = format!("{APP_NAME} - {}", self.autosave.target().file_name());
        if self.autosave.is_dirty() {
            title.push_str(" *");
        }
        match self.autosave.last_result() {
            Some(outcome) if outcome.is_saved() => {
                let _ = write!(title, " (last saved {})", outcome.at().format("%H:%M:%S"));
            }
            Some(_) => title.push_str(" (save failed)"),
            None => {}
        }
        title
    }

    // -- Editing ------------------------------------------------------------

    /// Insert text at a char offset. Returns `false` for an offset past the
    /// end.
    pub fn insert(&mut self, char_idx: usize, text: &str) -> bool {
        let revision = self.buffer.revision();
        let ok = self.buffer.insert(char_idx, text);
        self.changed_since(revision);
        ok
    }

    /// Remove a char range. Returns `false` for an invalid range.
    pub fn remove(&mut self, range: Range<usize>) -> bool {
        let revision = self.buffer.revision();
        let ok = self.buffer.remove(range);
        self.changed_since(revision);
        ok
    }

    /// Replace the whole document.
    pub fn replace_all(&mut self, text: &str) {
        self.buffer.replace_all(text);
        self.autosave.notify_changed();
    }

    /// Move the search cursor along with the host caret.
    pub const fn set_cursor(&mut self, char_idx: usize) {
        self.search.set_cursor(char_idx);
    }

    fn changed_since(&mut self, revision: u64) {
        if self.buffer.revision() != revision {
            self.autosave.notify_changed();
        }
    }

    // -- Documents ----------------------------------------------------------

    /// Start an empty document on the fallback target.
    ///
    /// A write the previous document still had scheduled runs first. With
    /// autosave off nothing is written; the host confirms with
    /// [`has_unsaved_changes`](Self::has_unsaved_changes) before discarding.
    pub fn new_document(&mut self) {
        let target = SaveTarget::Fallback(self.fallback_dir.join(&self.options.autosave_file));
        self.replace_engine(target);
        self.buffer = Buffer::new();
        self.search = SearchEngine::new();
        self.status = format!(
            "new document (autosave to {})",
            self.options.autosave_file
        );
        debug!(path = %self.autosave.target().path().display(), "new document");
    }

    /// Load a UTF-8 file. Later writes go back to it.
    ///
    /// # Errors
    ///
    /// Returns an [`OpenError`] if the file cannot be read; the current
    /// document is kept.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), OpenError> {
        let path = path.as_ref();
        let buffer = Buffer::from_file(path).map_err(|source| {
            let err = OpenError {
                path: path.to_path_buf(),
                source,
            };
            self.status = err.to_string();
            err
        })?;

        self.replace_engine(SaveTarget::User(path.to_path_buf()));
        self.buffer = buffer;
        self.search = SearchEngine::new();
        self.status = format!("opened: {}", path.display());
        debug!(path = %path.display(), chars = self.buffer.len_chars(), "opened");
        Ok(())
    }

    /// Write now to the current target.
    pub fn save(&mut self) -> &SaveOutcome {
        let outcome = self.autosave.force_save(&self.buffer);
        self.status = outcome.to_string();
        outcome
    }

    /// Make `path` the save target and write to it immediately.
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> &SaveOutcome {
        let outcome = self.autosave.set_target(path, &self.buffer);
        self.status = if outcome.is_saved() {
            format!("save target set: {}", outcome.path().display())
        } else {
            outcome.to_string()
        };
        outcome
    }

    /// Final write before the host exits. The host exits whatever the
    /// outcome.
    #[must_use]
    pub fn close(self) -> SaveOutcome {
        let Self {
            buffer, autosave, ..
        } = self;
        autosave.close(&buffer)
    }

    // -- Host loop ----------------------------------------------------------

    /// Run the debounced write if it is due. Returns the outcome when a
    /// write happened.
    pub fn tick(&mut self) -> Option<&SaveOutcome> {
        let outcome = self.autosave.poll(&self.buffer)?;
        self.status = outcome.to_string();
        Some(outcome)
    }

    /// When [`tick`](Self::tick) next has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.autosave.next_deadline()
    }

    /// How long the host loop may wait before calling [`tick`](Self::tick).
    #[must_use]
    pub fn time_until_due(&self) -> Option<Duration> {
        self.autosave.time_until_due()
    }

    // -- Search -------------------------------------------------------------

    /// Tag every occurrence of `query`.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyQuery`] for an empty query.
    pub fn highlight_all(&mut self, query: &str) -> Result<usize, SearchError> {
        let result = self.search.highlight_all(&self.buffer, query);
        self.sync_search_status();
        result
    }

    /// Jump to the next occurrence.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyQuery`] or [`SearchError::NotFound`].
    pub fn find_next(&mut self, query: &str) -> Result<SearchHit, SearchError> {
        let result = self.search.find_next(&self.buffer, query);
        self.sync_search_status();
        result
    }

    /// Jump to the previous occurrence.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyQuery`] or [`SearchError::NotFound`].
    pub fn find_prev(&mut self, query: &str) -> Result<SearchHit, SearchError> {
        let result = self.search.find_prev(&self.buffer, query);
        self.sync_search_status();
        result
    }

    /// Drop all search highlights.
    pub fn clear_highlight(&mut self) {
        self.search.clear_highlight();
        self.sync_search_status();
    }

    fn sync_search_status(&mut self) {
        self.status.clear();
        self.status.push_str(self.search.status());
    }

    // -- Options ------------------------------------------------------------

    /// Apply a `:set` argument string.
    ///
    /// Returns the text to display for queries and listings. `autosave` and
    /// `autosavedelay` take effect on the current document at once;
    /// `autosavefile` applies from the next [`new_document`](Self::new_document).
    ///
    /// # Errors
    ///
    /// Stops at the first directive that fails; the ones before it stay
    /// applied.
    pub fn set_option(&mut self, args: &str) -> Result<Option<String>, OptionError> {
        let mut shown = Vec::new();
        for directive in parse_set(args) {
            match self.options.apply(&directive) {
                Ok(Some(text)) => shown.push(text),
                Ok(None) => {}
                Err(err) => {
                    self.status = err.to_string();
                    self.reconfigure();
                    return Err(err);
                }
            }
        }
        self.reconfigure();

        if shown.is_empty() {
            return Ok(None);
        }
        let text = shown.join("  ");
        self.status.clone_from(&text);
        Ok(Some(text))
    }

    fn reconfigure(&mut self) {
        self.autosave.set_delay(self.options.autosave_delay);
        self.autosave.set_enabled(self.options.autosave);
    }

    /// Swap in a fresh engine for `target`, flushing the old document's
    /// scheduled write against the current buffer.
    fn replace_engine(&mut self, target: SaveTarget) {
        let next = self.engine(target);
        let previous = mem::replace(&mut self.autosave, next);
        if previous.is_pending() {
            let outcome = previous.close(&self.buffer);
            debug!(
                path = %outcome.path().display(),
                saved = outcome.is_saved(),
                "flushed scheduled write before switching document"
            );
        }
    }

    fn engine(&self, target: SaveTarget) -> AutosaveEngine<C, S> {
        configure(
            AutosaveEngine::new(target, self.clock.clone(), self.storage.clone()),
            &self.options,
        )
    }
}

fn configure<C: Clock, S: Storage>(
    engine: AutosaveEngine<C, S>,
    options: &Options,
) -> AutosaveEngine<C, S> {
    engine
        .with_delay(options.autosave_delay)
        .with_enabled(options.autosave)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosave::DEFAULT_DELAY;
    use crate::timer::ManualClock;
    use std::fs;

    use pretty_assertions::assert_eq;

    const MS: Duration = Duration::from_millis(1);

    struct Fixture {
        dir: tempfile::TempDir,
        clock: ManualClock,
        session: Session<ManualClock, FsStorage>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let session = Session::with_parts(dir.path(), clock.clone(), FsStorage);
        Fixture {
            dir,
            clock,
            session,
        }
    }

    impl Fixture {
        fn fallback(&self) -> PathBuf {
            self.dir.path().join("autosave.txt")
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                let end = self.session.buffer().len_chars();
                self.session.insert(end, ch.encode_utf8(&mut [0; 4]));
                self.clock.advance(MS * 100);
            }
        }
    }

    // -- Autosave -----------------------------------------------------------

    #[test]
    fn typing_writes_fallback_once_after_pause() {
        let mut fx = fixture();
        fx.type_text("hello");
        assert!(fx.session.tick().is_none());

        // The last keystroke was 100ms ago.
        fx.clock.advance(DEFAULT_DELAY - MS * 101);
        assert!(fx.session.tick().is_none());
        fx.clock.advance(MS);
        assert!(fx.session.tick().is_some_and(SaveOutcome::is_saved));
        assert!(fx.session.tick().is_none());

        assert_eq!(fs::read_to_string(fx.fallback()).unwrap(), "hello");
        assert!(fx.session.status().starts_with("autosaved: autosave.txt ("));
        assert!(!fx.session.has_unsaved_changes());
    }

    #[test]
    fn invalid_edit_does_not_schedule() {
        let mut fx = fixture();
        assert!(!fx.session.insert(5, "x"));
        assert!(!fx.session.remove(0..1));
        assert!(fx.session.insert(0, ""));
        assert!(!fx.session.has_unsaved_changes());
        assert_eq!(fx.session.next_deadline(), None);
    }

    #[test]
    fn remove_and_replace_schedule_writes() {
        let mut fx = fixture();
        fx.session.replace_all("abcdef");
        assert_eq!(fx.session.time_until_due(), Some(DEFAULT_DELAY));
        fx.clock.advance(MS * 500);
        assert!(fx.session.remove(0..3));
        assert_eq!(fx.session.time_until_due(), Some(DEFAULT_DELAY));
        fx.clock.advance(DEFAULT_DELAY);
        fx.session.tick();
        assert_eq!(fs::read_to_string(fx.fallback()).unwrap(), "def");
    }

    #[test]
    fn save_as_writes_immediately_then_autosaves_there() {
        let mut fx = fixture();
        fx.session.replace_all("first");
        let path = fx.dir.path().join("note.txt");
        assert!(fx.session.save_as(&path).is_saved());
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
        assert_eq!(
            fx.session.status(),
            format!("save target set: {}", path.display())
        );
        assert_eq!(fx.session.next_deadline(), None);

        fx.session.insert(5, " edit");
        fx.clock.advance(DEFAULT_DELAY);
        fx.session.tick();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first edit");
        assert!(!fx.fallback().exists());
    }

    #[test]
    fn failed_save_is_reported_and_keeps_dirty() {
        let mut fx = fixture();
        fx.session.replace_all("text");
        let path = fx.dir.path().join("missing").join("note.txt");
        assert!(!fx.session.save_as(&path).is_saved());
        assert!(fx.session.status().starts_with("save failed: "));
        assert!(fx.session.has_unsaved_changes());
        assert_eq!(fx.session.title(), "n-pad - note.txt * (save failed)");
    }

    #[test]
    fn explicit_save() {
        let mut fx = fixture();
        fx.session.replace_all("now");
        assert!(fx.session.save().is_saved());
        assert_eq!(fs::read_to_string(fx.fallback()).unwrap(), "now");
        assert_eq!(fx.session.next_deadline(), None);
    }

    #[test]
    fn close_writes_final_content() {
        let mut fx = fixture();
        fx.session.replace_all("bye");
        let fallback = fx.fallback();
        let outcome = fx.session.close();
        assert!(outcome.is_saved());
        assert_eq!(fs::read_to_string(fallback).unwrap(), "bye");
    }

    // -- Title --------------------------------------------------------------

    #[test]
    fn title_tracks_dirty_and_last_save() {
        let mut fx = fixture();
        assert_eq!(fx.session.title(), "n-pad - autosave.txt");
        fx.session.insert(0, "x");
        assert_eq!(fx.session.title(), "n-pad - autosave.txt *");
        fx.session.save();
        let title = fx.session.title();
        assert!(title.starts_with("n-pad - autosave.txt (last saved "), "{title}");
        assert!(title.ends_with(')'));
    }

    // -- Documents ----------------------------------------------------------

    #[test]
    fn open_loads_clean_document() {
        let mut fx = fixture();
        let path = fx.dir.path().join("story.txt");
        fs::write(&path, "once upon").unwrap();

        fx.session.open(&path).unwrap();
        assert_eq!(fx.session.buffer().contents(), "once upon");
        assert!(!fx.session.has_unsaved_changes());
        assert_eq!(fx.session.title(), "n-pad - story.txt");
        assert_eq!(fx.session.status(), format!("opened: {}", path.display()));

        fx.session.insert(9, " a time");
        fx.clock.advance(DEFAULT_DELAY);
        fx.session.tick();
        assert_eq!(fs::read_to_string(&path).unwrap(), "once upon a time");
    }

    #[test]
    fn open_failure_keeps_document() {
        let mut fx = fixture();
        fx.session.replace_all("keep");
        let err = fx.session.open(fx.dir.path().join("nope.txt")).unwrap_err();
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
        assert!(fx.session.status().starts_with("cannot open "));
        assert_eq!(fx.session.buffer().contents(), "keep");
        assert!(fx.session.has_unsaved_changes());
    }

    #[test]
    fn new_document_returns_to_fallback() {
        let mut fx = fixture();
        let path = fx.dir.path().join("note.txt");
        fx.session.replace_all("old");
        fx.session.save_as(&path);
        fx.session.insert(0, "x");

        fx.session.new_document();
        assert!(fx.session.buffer().is_empty());
        assert!(!fx.session.has_unsaved_changes());
        assert_eq!(fx.session.next_deadline(), None);
        assert_eq!(fx.session.title(), "n-pad - autosave.txt");
        assert_eq!(
            fx.session.status(),
            "new document (autosave to autosave.txt)"
        );

        fx.session.insert(0, "fresh");
        fx.clock.advance(DEFAULT_DELAY);
        fx.session.tick();
        assert_eq!(fs::read_to_string(fx.fallback()).unwrap(), "fresh");
        assert_eq!(fs::read_to_string(&path).unwrap(), "xold");
    }

    #[test]
    fn new_document_flushes_scheduled_write() {
        let mut fx = fixture();
        fx.session.insert(0, "important");
        fx.session.new_document();
        assert_eq!(fs::read_to_string(fx.fallback()).unwrap(), "important");

        fx.clock.advance(DEFAULT_DELAY * 2);
        assert!(fx.session.tick().is_none());
        assert_eq!(fs::read_to_string(fx.fallback()).unwrap(), "important");
    }

    #[test]
    fn open_flushes_scheduled_write_to_old_target() {
        let mut fx = fixture();
        let path = fx.dir.path().join("story.txt");
        fs::write(&path, "chapter one").unwrap();

        fx.session.insert(0, "scratch");
        fx.session.open(&path).unwrap();
        assert_eq!(fs::read_to_string(fx.fallback()).unwrap(), "scratch");
        assert_eq!(fs::read_to_string(&path).unwrap(), "chapter one");
        assert_eq!(fx.session.buffer().contents(), "chapter one");
    }

    #[test]
    fn switching_document_with_autosave_off_writes_nothing() {
        let mut fx = fixture();
        fx.session.set_option("noautosave").unwrap();
        fx.session.insert(0, "draft");
        fx.session.new_document();
        assert!(!fx.fallback().exists());
    }

    // -- Search -------------------------------------------------------------

    #[test]
    fn search_commands_report_status() {
        let mut fx = fixture();
        fx.session.replace_all("cat dog cat");

        assert_eq!(fx.session.highlight_all("cat"), Ok(2));
        assert_eq!(fx.session.status(), "2 matches highlighted");

        let hit = fx.session.find_next("cat").unwrap();
        assert_eq!(hit.cursor, 3);
        assert_eq!(fx.session.status(), "moved to 1:1");

        assert_eq!(fx.session.find_prev("cow"), Err(SearchError::NotFound));
        assert_eq!(fx.session.status(), "not found");
        assert_eq!(fx.session.search().cursor(), 3);

        assert_eq!(fx.session.highlight_all(""), Err(SearchError::EmptyQuery));
        assert_eq!(fx.session.status(), "query empty");

        fx.session.clear_highlight();
        assert_eq!(fx.session.status(), "highlights cleared");
        assert!(fx.session.search().matches().is_empty());
    }

    #[test]
    fn search_never_marks_dirty() {
        let mut fx = fixture();
        fx.session.highlight_all("x").unwrap();
        fx.session.set_cursor(0);
        assert!(!fx.session.has_unsaved_changes());
        assert_eq!(fx.session.next_deadline(), None);
    }

    // -- Options ------------------------------------------------------------

    #[test]
    fn noautosave_cancels_pending_write() {
        let mut fx = fixture();
        fx.session.insert(0, "x");
        assert_eq!(fx.session.set_option("noautosave"), Ok(None));
        assert_eq!(fx.session.next_deadline(), None);

        fx.session.insert(1, "y");
        fx.clock.advance(DEFAULT_DELAY);
        assert!(fx.session.tick().is_none());
        assert!(fx.session.has_unsaved_changes());
        assert!(!fx.fallback().exists());
    }

    #[test]
    fn delay_option_applies_to_next_edit() {
        let mut fx = fixture();
        fx.session.set_option("asd=300").unwrap();
        fx.session.insert(0, "x");
        assert_eq!(fx.session.time_until_due(), Some(MS * 300));
    }

    #[test]
    fn file_option_applies_on_new_document() {
        let mut fx = fixture();
        fx.session.set_option("asf=scratch.txt").unwrap();
        assert_eq!(fx.session.title(), "n-pad - autosave.txt");

        fx.session.new_document();
        assert_eq!(fx.session.title(), "n-pad - scratch.txt");
        assert_eq!(
            fx.session.status(),
            "new document (autosave to scratch.txt)"
        );
    }

    #[test]
    fn option_queries_and_errors() {
        let mut fx = fixture();
        assert_eq!(
            fx.session.set_option("asd?"),
            Ok(Some("autosavedelay=2000".to_string()))
        );
        assert_eq!(fx.session.status(), "autosavedelay=2000");

        let err = fx.session.set_option("asd=0").unwrap_err();
        assert_eq!(fx.session.status(), err.to_string());
        assert_eq!(fx.session.options().autosave_delay, DEFAULT_DELAY);
    }
}
