//! Editor options — the `:set` configuration layer.
//!
//! Parses `:set` directives and applies them to [`Options`], the settings
//! the session hands to each new autosave engine.
//!
//! # Supported syntax
//!
//! | Syntax           | Effect                        |
//! |------------------|-------------------------------|
//! | `:set option`    | Enable boolean / show value   |
//! | `:set nooption`  | Disable boolean               |
//! | `:set option!`   | Toggle boolean                |
//! | `:set option?`   | Query current value           |
//! | `:set option=V`  | Assign a value                |
//! | `:set`           | Show changed options          |
//! | `:set all`       | Show all options              |
//!
//! # Option names
//!
//! | Full name       | Abbrev | Type    | Default        |
//! |-----------------|--------|---------|----------------|
//! | `autosave`      | `as`   | bool    | true           |
//! | `autosavedelay` | `asd`  | integer | 2000 (ms)      |
//! | `autosavefile`  | `asf`  | string  | `autosave.txt` |

use std::time::Duration;

use crate::autosave::{DEFAULT_DELAY, DEFAULT_FILE_NAME};
use crate::error::OptionError;

/// A parsed `:set` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDirective {
    /// `:set option` — enable a boolean option.
    On(String),

    /// `:set nooption` — disable a boolean option.
    Off(String),

    /// `:set option!` — toggle a boolean option.
    Toggle(String),

    /// `:set option?` — query the current value.
    Query(String),

    /// `:set option=value` — assign a value.
    Assign(String, String),

    /// `:set` with no arguments — show changed options.
    ShowChanged,

    /// `:set all` — show all options.
    ShowAll,
}

/// Returns `true` if `name` is a known boolean option.
#[must_use]
pub fn is_bool_option(name: &str) -> bool {
    matches!(name, "autosave" | "as")
}

/// Returns `true` if `name` is a known numeric option.
#[must_use]
pub fn is_numeric_option(name: &str) -> bool {
    matches!(name, "autosavedelay" | "asd")
}

/// Returns `true` if `name` is a known string option.
#[must_use]
pub fn is_string_option(name: &str) -> bool {
    matches!(name, "autosavefile" | "asf")
}

/// Returns `true` if `name` is any known option.
#[must_use]
pub fn is_known_option(name: &str) -> bool {
    is_bool_option(name) || is_numeric_option(name) || is_string_option(name)
}

/// Parse the full `:set` arguments string into directives.
///
/// An empty argument string produces [`SetDirective::ShowChanged`].
#[must_use]
pub fn parse_set(args: &str) -> Vec<SetDirective> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return vec![SetDirective::ShowChanged];
    }
    trimmed.split_whitespace().map(parse_set_arg).collect()
}

/// Parse a single `:set` argument into a directive.
#[must_use]
pub fn parse_set_arg(arg: &str) -> SetDirective {
    if arg == "all" {
        return SetDirective::ShowAll;
    }

    if let Some((name, value)) = arg.split_once('=') {
        return SetDirective::Assign(name.to_string(), value.to_string());
    }

    if let Some(name) = arg.strip_suffix('?') {
        return SetDirective::Query(name.to_string());
    }

    if let Some(name) = arg.strip_suffix('!') {
        return SetDirective::Toggle(name.to_string());
    }

    // `noautosave`: only when the remainder is a known boolean option.
    if let Some(name) = arg.strip_prefix("no") {
        if is_bool_option(name) {
            return SetDirective::Off(name.to_string());
        }
    }

    // A bare value option name shows its value.
    if is_numeric_option(arg) || is_string_option(arg) {
        return SetDirective::Query(arg.to_string());
    }

    SetDirective::On(arg.to_string())
}

/// Format a boolean option for display: `"name"` or `"noname"`.
#[must_use]
pub fn format_bool(name: &str, value: bool) -> String {
    if value {
        name.to_string()
    } else {
        format!("no{name}")
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Autosave settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Edits schedule a debounced write.
    pub autosave: bool,
    /// Quiet period before the write fires.
    pub autosave_delay: Duration,
    /// Fallback file name, resolved against the working directory.
    pub autosave_file: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            autosave: true,
            autosave_delay: DEFAULT_DELAY,
            autosave_file: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

impl Options {
    /// Apply one directive. Returns text to show for queries and listings,
    /// `None` for assignments.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] for unknown names, toggling a value
    /// option, or a value that does not parse.
    pub fn apply(&mut self, directive: &SetDirective) -> Result<Option<String>, OptionError> {
        match directive {
            SetDirective::On(name) => {
                self.set_bool(name, |_| true)?;
                Ok(None)
            }
            SetDirective::Off(name) => {
                self.set_bool(name, |_| false)?;
                Ok(None)
            }
            SetDirective::Toggle(name) => {
                self.set_bool(name, |value| !value)?;
                Ok(None)
            }
            SetDirective::Query(name) => self.show(name).map(Some),
            SetDirective::Assign(name, value) => {
                self.assign(name, value)?;
                Ok(None)
            }
            SetDirective::ShowChanged => Ok(Some(self.changed().join("  "))),
            SetDirective::ShowAll => Ok(Some(self.all().join("  "))),
        }
    }

    /// Display one option as `name`, `noname` or `name=value`.
    ///
    /// # Errors
    ///
    /// [`OptionError::Unknown`] for an unknown name.
    pub fn show(&self, name: &str) -> Result<String, OptionError> {
        if is_bool_option(name) {
            Ok(format_bool("autosave", self.autosave))
        } else if is_numeric_option(name) {
            Ok(format!("autosavedelay={}", self.autosave_delay.as_millis()))
        } else if is_string_option(name) {
            Ok(format!("autosavefile={}", self.autosave_file))
        } else {
            Err(OptionError::Unknown(name.to_string()))
        }
    }

    /// Every option that differs from its default.
    #[must_use]
    pub fn changed(&self) -> Vec<String> {
        let defaults = Self::default();
        let mut out = Vec::new();
        if self.autosave != defaults.autosave {
            out.push(format_bool("autosave", self.autosave));
        }
        if self.autosave_delay != defaults.autosave_delay {
            out.push(format!("autosavedelay={}", self.autosave_delay.as_millis()));
        }
        if self.autosave_file != defaults.autosave_file {
            out.push(format!("autosavefile={}", self.autosave_file));
        }
        out
    }

    /// Every option with its current value.
    #[must_use]
    pub fn all(&self) -> Vec<String> {
        vec![
            format_bool("autosave", self.autosave),
            format!("autosavedelay={}", self.autosave_delay.as_millis()),
            format!("autosavefile={}", self.autosave_file),
        ]
    }

    fn set_bool(&mut self, name: &str, f: impl FnOnce(bool) -> bool) -> Result<(), OptionError> {
        if is_bool_option(name) {
            self.autosave = f(self.autosave);
            Ok(())
        } else if is_known_option(name) {
            Err(OptionError::NotBoolean(name.to_string()))
        } else {
            Err(OptionError::Unknown(name.to_string()))
        }
    }

    fn assign(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        let invalid = || OptionError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };

        if is_numeric_option(name) {
            let ms: u64 = value.parse().map_err(|_| invalid())?;
            if ms == 0 {
                return Err(invalid());
            }
            self.autosave_delay = Duration::from_millis(ms);
        } else if is_string_option(name) {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(invalid());
            }
            self.autosave_file = value.to_string();
        } else if is_bool_option(name) {
            return Err(invalid());
        } else {
            return Err(OptionError::Unknown(name.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
