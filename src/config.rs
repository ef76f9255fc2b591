// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Runtime configuration
//!
//! Every knob can come from the environment or be set explicitly;
//! explicit values win. A text database takes precedence over an inline
//! text buffer, which takes precedence over a pre-parsed blob.

use std::{env, path::PathBuf};

const ENV_DATABASE_FILE: &str = "MARPAX_DATABASE_TERMINFO_FILE";
const ENV_DATABASE_TEXT: &str = "MARPAX_DATABASE_TERMINFO_TXT";
const ENV_DATABASE_BLOB: &str = "MARPAX_DATABASE_TERMINFO_BIN";
const ENV_CAPS_FILE: &str = "MARPAX_DATABASE_TERMINFO_CAPS";
const ENV_STUBS_TEXT: &str = "MARPAX_DATABASE_TERMINFO_STUBS_TXT";
const ENV_STUBS_BLOB: &str = "MARPAX_DATABASE_TERMINFO_STUBS_BIN";
const ENV_CACHE_STUBS: &str = "MARPAX_DATABASE_TERMINFO_CACHE_STUBS";
const ENV_CACHE_STUBS_AS_TEXT: &str = "MARPAX_DATABASE_TERMINFO_CACHE_STUBS_AS_TXT";

/// Configuration of a [`Runtime`](crate::runtime::Runtime)
#[derive(Debug, Clone)]
pub struct Options {
    /// Path to a text database; highest precedence
    pub database_file: Option<PathBuf>,
    /// Inline text database
    pub database_text: Option<String>,
    /// Path to a pre-parsed database blob
    pub database_blob: Option<PathBuf>,
    /// Path to the capability translation table
    pub caps_file: Option<PathBuf>,
    /// Precompiled capability strings, one escaped source per line
    pub stubs_text: Option<PathBuf>,
    /// Precompiled capability strings in blob form
    pub stubs_blob: Option<PathBuf>,
    /// Whether compiled capability strings are cached at all
    pub cache_stubs: bool,
    /// Whether [`save_stubs`](crate::runtime::Runtime::save_stubs)
    /// writes text instead of a blob
    pub stubs_as_text: bool,
    /// Terminal to select when the caller names none
    pub term: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            database_file: None,
            database_text: None,
            database_blob: None,
            caps_file: None,
            stubs_text: None,
            stubs_blob: None,
            cache_stubs: true,
            stubs_as_text: false,
            term: None,
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name).map(PathBuf::from)
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => !matches!(value.as_str(), "" | "0" | "false" | "no"),
        Err(_) => default,
    }
}

impl Options {
    /// Build options from the environment
    pub fn from_env() -> Self {
        Self {
            database_file: env_path(ENV_DATABASE_FILE),
            database_text: env::var(ENV_DATABASE_TEXT).ok(),
            database_blob: env_path(ENV_DATABASE_BLOB),
            caps_file: env_path(ENV_CAPS_FILE),
            stubs_text: env_path(ENV_STUBS_TEXT),
            stubs_blob: env_path(ENV_STUBS_BLOB),
            cache_stubs: env_flag(ENV_CACHE_STUBS, true),
            stubs_as_text: env_flag(ENV_CACHE_STUBS_AS_TEXT, false),
            term: env::var("TERM").ok(),
        }
    }

    /// The terminal name to select by default
    ///
    /// The explicit option wins over `TERM`; with neither set the name
    /// is `unknown`, and callers fall back to `dumb` when even that is
    /// missing from the database.
    pub fn term_name(&self) -> &str {
        self.term.as_deref().unwrap_or("unknown")
    }

    pub fn with_database_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_file = Some(path.into());
        self
    }

    pub fn with_database_text(mut self, text: impl Into<String>) -> Self {
        self.database_text = Some(text.into());
        self
    }

    pub fn with_database_blob(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_blob = Some(path.into());
        self
    }

    pub fn with_caps_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.caps_file = Some(path.into());
        self
    }

    pub fn with_term(mut self, name: impl Into<String>) -> Self {
        self.term = Some(name.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.database_file, None);
        assert!(options.cache_stubs);
        assert!(!options.stubs_as_text);
        assert_eq!(options.term_name(), "unknown");
    }

    #[test]
    fn from_env_reads_every_variable() {
        temp_env::with_vars(
            [
                (ENV_DATABASE_FILE, Some("/data/terminfo.src")),
                (ENV_DATABASE_TEXT, Some("dumb|dumb,\n\tam,\n")),
                (ENV_DATABASE_BLOB, Some("/data/terminfo.bin")),
                (ENV_CAPS_FILE, Some("/data/Caps")),
                (ENV_STUBS_TEXT, Some("/data/stubs.txt")),
                (ENV_STUBS_BLOB, Some("/data/stubs.bin")),
                (ENV_CACHE_STUBS, Some("0")),
                (ENV_CACHE_STUBS_AS_TEXT, Some("1")),
                ("TERM", Some("vt100")),
            ],
            || {
                let options = Options::from_env();
                assert_eq!(
                    options.database_file.as_deref(),
                    Some(std::path::Path::new("/data/terminfo.src"))
                );
                assert_eq!(options.database_text.as_deref(), Some("dumb|dumb,\n\tam,\n"));
                assert_eq!(
                    options.database_blob.as_deref(),
                    Some(std::path::Path::new("/data/terminfo.bin"))
                );
                assert_eq!(
                    options.caps_file.as_deref(),
                    Some(std::path::Path::new("/data/Caps"))
                );
                assert!(!options.cache_stubs);
                assert!(options.stubs_as_text);
                assert_eq!(options.term_name(), "vt100");
            },
        );
    }

    #[test]
    fn term_default_chain() {
        temp_env::with_vars([("TERM", None::<&str>)], || {
            assert_eq!(Options::from_env().term_name(), "unknown");
        });
        let options = Options::from_env().with_term("ansi");
        assert_eq!(options.term_name(), "ansi");
    }
}
