//! Autosave — debounced, crash-safe persistence of the live document.
//!
//! The host calls [`AutosaveEngine::notify_changed`] on every edit. Each call
//! cancels the pending write and schedules a new one a fixed delay later
//! (trailing-edge debounce), so a burst of typing produces one write after
//! the user pauses, however fast the edits arrive.
//!
//! # Lifecycle
//!
//! ```text
//!   notify_changed ──▶ pending timer ──(delay passes)──▶ poll ──▶ write
//!         ▲                  │
//!         └── resets ────────┘        force_save / set_target / close
//!                                     cancel the timer and write now
//! ```
//!
//! One engine serves one document. It holds the [`SaveTarget`], the single
//! live timer handle, the dirty flag and the outcome of the last write. "New
//! document" means constructing a new engine.
//!
//! # Durability
//!
//! Writes go through [`Storage::write_atomic`]: temp file in the target's
//! directory, fsync, rename. A failed write is recorded as
//! [`SaveOutcome::Failed`] and leaves the file on disk exactly as it was. The
//! engine keeps running; the next edit or explicit save retries.
//!
//! # Scheduling
//!
//! The engine never sleeps. The host loop asks [`next_deadline`] how long it
//! may wait and calls [`poll`] when it wakes. Everything takes `&mut self`,
//! so a write in progress cannot be interrupted by a new schedule and a
//! timer that has started firing cannot be cancelled.
//!
//! [`next_deadline`]: AutosaveEngine::next_deadline
//! [`poll`]: AutosaveEngine::poll

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::buffer::TextSource;
use crate::error::SaveError;
use crate::storage::{FsStorage, Storage};
use crate::timer::{Clock, SystemClock, TimerId, Timers};

/// Quiet period after the last edit before an autosave fires.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);

/// File name of the fallback target, created in the working directory.
pub const DEFAULT_FILE_NAME: &str = "autosave.txt";

// ---------------------------------------------------------------------------
// SaveTarget
// ---------------------------------------------------------------------------

/// The destination for autosave writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// The process-default file, used until the user picks a path.
    Fallback(PathBuf),
    /// A path the user chose ("save as") or opened.
    User(PathBuf),
}

impl SaveTarget {
    /// The fallback target `<working dir>/<file_name>`.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::WorkingDir`] if the working directory cannot be
    /// resolved.
    pub fn fallback(file_name: &str) -> Result<Self, SaveError> {
        let dir = env::current_dir().map_err(SaveError::WorkingDir)?;
        Ok(Self::Fallback(dir.join(file_name)))
    }

    /// The target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Fallback(path) | Self::User(path) => path,
        }
    }

    /// True once the user has chosen a path.
    #[inline]
    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// The final path component, for titles and status text.
    #[must_use]
    pub fn file_name(&self) -> String {
        display_name(self.path())
    }
}

// ---------------------------------------------------------------------------
// SaveOutcome
// ---------------------------------------------------------------------------

/// Result of one write attempt.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// The document reached the disk.
    Saved { path: PathBuf, at: DateTime<Local> },
    /// The write failed; the file on disk is unchanged.
    Failed {
        path: PathBuf,
        at: DateTime<Local>,
        error: Arc<SaveError>,
    },
}

impl SaveOutcome {
    /// True for [`SaveOutcome::Saved`].
    #[inline]
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }

    /// The path the attempt wrote to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Saved { path, .. } | Self::Failed { path, .. } => path,
        }
    }

    /// When the attempt finished.
    #[must_use]
    pub fn at(&self) -> DateTime<Local> {
        match self {
            Self::Saved { at, .. } | Self::Failed { at, .. } => *at,
        }
    }

    /// The error, if the attempt failed.
    #[must_use]
    pub fn error(&self) -> Option<&SaveError> {
        match self {
            Self::Saved { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved { path, at } => {
                write!(f, "autosaved: {} ({})", display_name(path), at.format("%H:%M:%S"))
            }
            Self::Failed { error, .. } => write!(f, "save failed: {error}"),
        }
    }
}

// ---------------------------------------------------------------------------
// AutosaveStatus
// ---------------------------------------------------------------------------

/// A borrowed snapshot of the engine state for display.
#[derive(Debug, Clone, Copy)]
pub struct AutosaveStatus<'a> {
    pub target: &'a SaveTarget,
    /// Edits have happened since the last successful write.
    pub dirty: bool,
    /// A debounced write is scheduled.
    pub pending: bool,
    pub enabled: bool,
    pub last_result: Option<&'a SaveOutcome>,
}

impl fmt::Display for AutosaveStatus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_result {
            Some(outcome) => fmt::Display::fmt(outcome, f),
            None if self.dirty => f.write_str("unsaved changes"),
            None => f.write_str("ready"),
        }
    }
}

// ---------------------------------------------------------------------------
// AutosaveEngine
// ---------------------------------------------------------------------------

/// Debounced autosave for one document.
#[derive(Debug)]
pub struct AutosaveEngine<C: Clock = SystemClock, S: Storage = FsStorage> {
    target: SaveTarget,
    delay: Duration,
    enabled: bool,
    timers: Timers<C>,
    /// The single live timer handle. `None` when nothing is scheduled.
    pending: Option<TimerId>,
    storage: S,
    dirty: bool,
    /// Revision of the text that last reached the disk.
    saved_revision: Option<u64>,
    last_result: Option<SaveOutcome>,
    attempts: u64,
}

impl AutosaveEngine {
    /// An engine on the real clock and filesystem, writing to
    /// `autosave.txt` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::WorkingDir`] if the working directory cannot be
    /// resolved.
    pub fn with_fallback() -> Result<Self, SaveError> {
        Ok(Self::new(
            SaveTarget::fallback(DEFAULT_FILE_NAME)?,
            SystemClock,
            FsStorage,
        ))
    }
}

impl<C: Clock, S: Storage> AutosaveEngine<C, S> {
    // -- Construction -------------------------------------------------------

    /// Create an engine writing to `target`. The document starts clean.
    #[must_use]
    pub const fn new(target: SaveTarget, clock: C, storage: S) -> Self {
        Self {
            target,
            delay: DEFAULT_DELAY,
            enabled: true,
            timers: Timers::new(clock),
            pending: None,
            storage,
            dirty: false,
            saved_revision: None,
            last_result: None,
            attempts: 0,
        }
    }

    /// Create an engine for a document opened from `path`. Writes go back to
    /// that file; the fallback is never used.
    #[must_use]
    pub const fn for_path(path: PathBuf, clock: C, storage: S) -> Self {
        Self::new(SaveTarget::User(path), clock, storage)
    }

    /// Override the debounce delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Start with debounced autosave switched on or off.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    // -- Accessors ----------------------------------------------------------

    /// The active save target.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> &SaveTarget {
        &self.target
    }

    /// The debounce delay.
    #[inline]
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the debounce delay. A write already scheduled keeps its
    /// deadline; the new delay applies from the next edit.
    pub const fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// True when edits schedule writes.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch debounced writes on or off. Turning them off cancels the
    /// pending write; explicit saves keep working either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel_pending();
        }
    }

    /// Edits have happened since the last successful write.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// A debounced write is scheduled and has not fired.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some_and(|id| self.timers.is_pending(id))
    }

    /// Revision of the text that last reached the disk.
    #[inline]
    #[must_use]
    pub const fn saved_revision(&self) -> Option<u64> {
        self.saved_revision
    }

    /// Outcome of the most recent write attempt.
    #[inline]
    #[must_use]
    pub const fn last_result(&self) -> Option<&SaveOutcome> {
        self.last_result.as_ref()
    }

    /// Number of write attempts made so far.
    #[inline]
    #[must_use]
    pub const fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Snapshot for display. Never fails.
    #[must_use]
    pub fn status(&self) -> AutosaveStatus<'_> {
        AutosaveStatus {
            target: &self.target,
            dirty: self.dirty,
            pending: self.is_pending(),
            enabled: self.enabled,
            last_result: self.last_result.as_ref(),
        }
    }

    // -- Scheduling ---------------------------------------------------------

    /// Record an edit and (re)start the debounce timer.
    pub fn notify_changed(&mut self) {
        self.dirty = true;
        self.cancel_pending();
        if !self.enabled {
            return;
        }
        self.pending = Some(self.timers.schedule(self.delay));
        debug!(
            path = %self.target.path().display(),
            delay = ?self.delay,
            "autosave scheduled"
        );
    }

    /// When the pending write is due, if one is scheduled.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.and_then(|id| self.timers.deadline(id))
    }

    /// How long the host may wait before calling [`poll`](Self::poll).
    #[must_use]
    pub fn time_until_due(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|at| at.saturating_duration_since(self.timers.now()))
    }

    /// Fire the pending write if its deadline has passed.
    ///
    /// Returns the outcome when a write happened, `None` otherwise.
    pub fn poll<T: TextSource + ?Sized>(&mut self, text: &T) -> Option<&SaveOutcome> {
        let expired = self.timers.take_expired();
        let fired = self.pending.is_some_and(|id| expired.contains(&id));
        if !fired {
            return None;
        }
        // The handle is gone from the queue; nothing can cancel this write.
        self.pending = None;
        debug!(path = %self.target.path().display(), "autosave timer fired");
        Some(self.record(text))
    }

    // -- Explicit saves -----------------------------------------------------

    /// Write now, bypassing and cancelling the debounce timer.
    pub fn force_save<T: TextSource + ?Sized>(&mut self, text: &T) -> &SaveOutcome {
        self.cancel_pending();
        self.record(text)
    }

    /// Switch to a user-chosen path and write to it immediately.
    ///
    /// The fallback target is never used again by this engine.
    pub fn set_target<T: TextSource + ?Sized>(
        &mut self,
        path: impl Into<PathBuf>,
        text: &T,
    ) -> &SaveOutcome {
        self.target = SaveTarget::User(path.into());
        self.force_save(text)
    }

    /// Final write before shutdown. The caller proceeds regardless of the
    /// outcome.
    pub fn close<T: TextSource + ?Sized>(mut self, text: &T) -> SaveOutcome {
        self.cancel_pending();
        self.attempt(text)
    }

    // -- Internals ----------------------------------------------------------

    fn cancel_pending(&mut self) {
        if let Some(id) = self.pending.take() {
            self.timers.cancel(id);
        }
    }

    fn record<T: TextSource + ?Sized>(&mut self, text: &T) -> &SaveOutcome {
        let outcome = self.attempt(text);
        self.last_result.insert(outcome)
    }

    fn attempt<T: TextSource + ?Sized>(&mut self, text: &T) -> SaveOutcome {
        let revision = text.revision();
        let contents = text.text();
        let path = self.target.path().to_path_buf();
        self.attempts += 1;

        match self.storage.write_atomic(&path, &contents) {
            Ok(()) => {
                self.dirty = false;
                self.saved_revision = Some(revision);
                debug!(path = %path.display(), bytes = contents.len(), revision, "autosaved");
                SaveOutcome::Saved {
                    path,
                    at: Local::now(),
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "autosave failed");
                SaveOutcome::Failed {
                    path,
                    at: Local::now(),
                    error: Arc::new(err),
                }
            }
        }
    }
}

/// Last path component, or the whole path when there is none.
fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
