//! # n-pad — Notepad core
//!
//! A plain-text document with debounced, crash-safe autosave and literal
//! search. The window, menus and dialogs live in the host; this crate is
//! everything behind them:
//!
//! - **[`position`]** — `Position` (line, col) for status text, 0-indexed
//! - **[`buffer`]** — `Buffer` wrapping a rope, plus the `TextSource` read trait
//! - **[`timer`]** — `Clock` and the cooperative deferred-timer queue
//! - **[`storage`]** — atomic temp-file-then-rename writes
//! - **[`error`]** — save, search, open and option errors
//! - **[`autosave`]** — the debounced autosave engine
//! - **[`search`]** — highlight-all and wrapping find next / previous
//! - **[`options`]** — `:set`-style autosave settings
//! - **[`session`]** — one open document wired to both engines
//!
//! The library logs through `tracing` and installs no subscriber.

pub mod autosave;
pub mod buffer;
pub mod error;
pub mod options;
pub mod position;
pub mod search;
pub mod session;
pub mod storage;
pub mod timer;

pub use autosave::{AutosaveEngine, AutosaveStatus, SaveOutcome, SaveTarget};
pub use buffer::{Buffer, TextSource};
pub use error::{OpenError, OptionError, SaveError, SearchError};
pub use search::{Match, SearchEngine, SearchHit};
pub use session::Session;
