// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Runtime facade
//!
//! A [`Runtime`] owns the database, the translation table, the selected
//! terminal and the compiled-string cache, and answers the classic
//! termcap/terminfo capability queries with their numeric sentinel
//! conventions.

use std::{
    collections::HashMap,
    fs, io,
    os::fd::BorrowedFd,
    path::Path,
    sync::Arc,
    thread,
    time::Duration,
};

use tracing::{debug, warn};

use crate::{
    caps::{self, CapTable},
    compile::{self, Program, compile, escape_byte},
    config::Options,
    expand::{self, ExpandContext, Parameter},
    parse::{self, CapValue, Database, parse},
    resolve::{self, ResolvedEntry, resolve},
    speed,
};

/// Errors reported by runtime operations
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error")]
    IO(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] parse::Error),
    #[error(transparent)]
    Caps(#[from] caps::Error),
    #[error(transparent)]
    Compile(#[from] compile::Error),
    #[error(transparent)]
    Expand(#[from] expand::Error),
    #[error("invalid stub cache blob")]
    BadStubs,
}

/// Distinguished result of terminal selection
///
/// The termcap-facing [`Runtime::tgetent`] maps these to -1 and 0.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectError {
    #[error("terminfo database unavailable")]
    DatabaseUnavailable,
    #[error("terminal {0:?} not found")]
    NotFound(String),
    #[error("cyclic use= reference through {0:?}")]
    CyclicUse(String),
}

impl From<resolve::Error> for SelectError {
    fn from(error: resolve::Error) -> Self {
        match error {
            resolve::Error::NotFound(name) => SelectError::NotFound(name),
            resolve::Error::CyclicUse(name) => SelectError::CyclicUse(name),
        }
    }
}

/// Result of a terminfo or variable string query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringQuery<'a> {
    Present(&'a [u8]),
    /// The capability exists but is not a string
    WrongType,
    Absent,
}

impl<'a> StringQuery<'a> {
    /// The string value, if present
    pub fn bytes(&self) -> Option<&'a [u8]> {
        match *self {
            StringQuery::Present(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// A caller-owned output buffer with a write cursor
///
/// [`Runtime::get_string_termcap`] splices the returned value at the
/// cursor and advances it, mirroring the historical `tgetstr` area
/// pointer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Area {
    buffer: Vec<u8>,
    position: usize,
}

impl Area {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn splice(&mut self, bytes: &[u8]) {
        let at = self.position.min(self.buffer.len());
        self.buffer.splice(at..at, bytes.iter().copied());
        self.position = at + bytes.len();
    }
}

/// Compiled capability strings memoized by their raw source
struct StubCache {
    enabled: bool,
    programs: HashMap<Vec<u8>, Arc<Program>>,
}

impl StubCache {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            programs: HashMap::new(),
        }
    }

    fn program_for(&mut self, cap: &[u8]) -> Result<Arc<Program>, compile::Error> {
        if !self.enabled {
            return Ok(Arc::new(compile(cap)?));
        }
        if let Some(program) = self.programs.get(cap) {
            return Ok(program.clone());
        }
        let program = Arc::new(compile(cap)?);
        self.programs.insert(cap.to_vec(), program.clone());
        Ok(program)
    }

    fn insert(&mut self, cap: Vec<u8>, program: Program) {
        self.programs.insert(cap, Arc::new(program));
    }
}

/// A parsed padding directive, in tenths of a millisecond
struct Padding {
    tenths: u64,
    /// `*`: scale by the number of affected lines
    proportional: bool,
}

fn parse_padding(inner: &[u8]) -> Option<Padding> {
    let mut tenths: u64 = 0;
    let mut pos = 0;
    let mut digits = 0;
    while let Some(digit @ b'0'..=b'9') = inner.get(pos) {
        tenths = tenths.checked_mul(10)?.checked_add(u64::from(digit - b'0'))?;
        digits += 1;
        pos += 1;
    }
    if digits == 0 {
        return None;
    }
    tenths = tenths.checked_mul(10)?;
    if inner.get(pos) == Some(&b'.') {
        pos += 1;
        let digit = inner.get(pos)?;
        if !digit.is_ascii_digit() {
            return None;
        }
        tenths += u64::from(digit - b'0');
        pos += 1;
    }
    let mut proportional = false;
    let mut mandatory = false;
    for byte in &inner[pos..] {
        match byte {
            b'*' if !proportional => proportional = true,
            // `/` marks the delay as mandatory; every delay is applied
            // here, so the flag only needs to parse.
            b'/' if !mandatory => mandatory = true,
            _ => return None,
        }
    }
    Some(Padding {
        tenths,
        proportional,
    })
}

/// The terminal-capability runtime
pub struct Runtime {
    options: Options,
    table: CapTable,
    database: Option<Database>,
    current: Option<ResolvedEntry>,
    stubs: StubCache,
    flush: Option<Box<dyn FnMut()>>,
    /// Bank context used before any terminal is selected
    fallback_context: ExpandContext,
}

impl Runtime {
    /// Build a runtime configured from the environment
    pub fn new() -> Self {
        Self::with_options(Options::from_env())
    }

    /// Build a runtime with explicit options
    ///
    /// Database and table sources named by the options are loaded
    /// eagerly; a source that fails to load leaves the database
    /// unavailable with a warning, which surfaces as -1 from
    /// [`Runtime::tgetent`].
    pub fn with_options(options: Options) -> Self {
        let mut runtime = Self {
            stubs: StubCache::new(options.cache_stubs),
            options,
            table: CapTable::default(),
            database: None,
            current: None,
            flush: None,
            fallback_context: ExpandContext::new(),
        };

        if let Some(path) = runtime.options.caps_file.clone()
            && let Err(error) = runtime.load_translation(&path)
        {
            warn!(path = %path.display(), %error, "cannot load translation table");
        }

        // Precedence: text file, then inline text, then blob.
        let result = if let Some(path) = runtime.options.database_file.clone() {
            runtime.load_database_file(&path)
        } else if let Some(text) = runtime.options.database_text.clone() {
            runtime.load_database_text(&text)
        } else if let Some(path) = runtime.options.database_blob.clone() {
            runtime.load_database_blob(&path)
        } else {
            Ok(())
        };
        if let Err(error) = result {
            warn!(%error, "terminfo database unavailable");
        }

        if runtime.options.cache_stubs {
            if let Some(path) = runtime.options.stubs_text.clone()
                && let Err(error) = runtime.load_stubs_text(&path)
            {
                warn!(path = %path.display(), %error, "cannot load text stubs");
            }
            if let Some(path) = runtime.options.stubs_blob.clone()
                && let Err(error) = runtime.load_stubs_blob(&path)
            {
                warn!(path = %path.display(), %error, "cannot load stub blob");
            }
        }

        runtime
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Load the database from a source text file
    pub fn load_database_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let text = fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "loading terminfo source database");
        self.load_database_text(&text)
    }

    /// Load the database from source text
    pub fn load_database_text(&mut self, text: &str) -> Result<(), Error> {
        self.database = Some(parse(text)?);
        Ok(())
    }

    /// Load the database from a pre-parsed blob file
    pub fn load_database_blob(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let blob = fs::read(path.as_ref())?;
        self.database = Some(Database::from_blob(&blob)?);
        Ok(())
    }

    /// Load the capability translation table from a file
    pub fn load_translation(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.table = CapTable::load(path)?;
        Ok(())
    }

    /// Load the capability translation table from text
    pub fn load_translation_text(&mut self, text: &str) {
        self.table = CapTable::parse(text);
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn current(&self) -> Option<&ResolvedEntry> {
        self.current.as_ref()
    }

    /// Select the current terminal by name
    ///
    /// `fd` names an open terminal for output-speed detection; standard
    /// input is used when `None`.
    pub fn select_terminal(
        &mut self,
        name: &str,
        fd: Option<BorrowedFd>,
    ) -> Result<(), SelectError> {
        let Some(database) = &self.database else {
            return Err(SelectError::DatabaseUnavailable);
        };
        let speed = speed::detect(fd);
        let resolved = resolve(database, &self.table, name, speed)?;
        debug!(name, ospeed = speed.ospeed, baudrate = speed.baudrate, "terminal selected");
        self.current = Some(resolved);
        Ok(())
    }

    /// Select the terminal named by `TERM`, falling back to `dumb`
    pub fn select_default(&mut self, fd: Option<BorrowedFd>) -> Result<(), SelectError> {
        let name = self.options.term_name().to_string();
        match self.select_terminal(&name, fd) {
            Err(SelectError::NotFound(_)) if name != "dumb" => self.select_terminal("dumb", fd),
            other => other,
        }
    }

    /// Termcap-style entry selection: 1 found, 0 not found, -1 when the
    /// database is unavailable
    pub fn tgetent(&mut self, name: &str) -> i32 {
        match self.select_terminal(name, None) {
            Ok(()) => 1,
            Err(SelectError::DatabaseUnavailable) => -1,
            Err(_) => 0,
        }
    }

    /// Boolean query by termcap name; absent is `false`
    pub fn get_flag_termcap(&self, id: &str) -> bool {
        matches!(
            self.current().and_then(|entry| entry.termcap.get(id)),
            Some(cap) if cap.value == CapValue::Boolean(true)
        )
    }

    /// Boolean query by terminfo name: 1 set, 0 absent or cancelled,
    /// -1 when the name is not a boolean capability
    pub fn get_flag_terminfo(&self, id: &str) -> i32 {
        tri_flag(self.current().and_then(|entry| entry.terminfo.get(id)).map(|cap| &cap.value))
    }

    /// Boolean query by variable name, with terminfo sentinels
    pub fn get_flag_variable(&self, id: &str) -> i32 {
        tri_flag(self.current().and_then(|entry| entry.variable.get(id)).map(|cap| &cap.value))
    }

    /// Numeric query by termcap name; -1 when absent or not numeric
    pub fn get_number_termcap(&self, id: &str) -> i32 {
        match self.current().and_then(|entry| entry.termcap.get(id)) {
            Some(cap) => match cap.value {
                CapValue::Numeric(value) => value,
                _ => -1,
            },
            None => -1,
        }
    }

    /// Numeric query by terminfo name: -1 absent or cancelled, -2 when
    /// the name is not a numeric capability
    pub fn get_number_terminfo(&self, id: &str) -> i32 {
        tri_number(self.current().and_then(|entry| entry.terminfo.get(id)).map(|cap| &cap.value))
    }

    /// Numeric query by variable name, with terminfo sentinels
    pub fn get_number_variable(&self, id: &str) -> i32 {
        tri_number(self.current().and_then(|entry| entry.variable.get(id)).map(|cap| &cap.value))
    }

    /// String query by termcap name
    ///
    /// Returns the raw capability value, appending it at the write
    /// cursor of `area` when one is supplied. Absent and non-string
    /// capabilities yield `None`.
    pub fn get_string_termcap(&self, id: &str, area: Option<&mut Area>) -> Option<&[u8]> {
        let cap = self.current()?.termcap.get(id)?;
        let CapValue::String(bytes) = &cap.value else {
            return None;
        };
        if let Some(area) = area {
            area.splice(bytes);
        }
        Some(bytes)
    }

    /// String query by terminfo name
    pub fn get_string_terminfo(&self, id: &str) -> StringQuery<'_> {
        tri_string(self.current().and_then(|entry| entry.terminfo.get(id)).map(|cap| &cap.value))
    }

    /// String query by variable name; covers the pseudo variables `PC`,
    /// `UP` and `BC`
    pub fn get_string_variable(&self, id: &str) -> StringQuery<'_> {
        tri_string(self.current().and_then(|entry| entry.variable.get(id)).map(|cap| &cap.value))
    }

    /// Expand a parameterized capability string
    ///
    /// The string is compiled through the stub cache and executed
    /// against the selected terminal's variable banks, so static
    /// variables persist between calls.
    pub fn expand(&mut self, cap: &[u8], params: &[Parameter]) -> Result<Vec<u8>, Error> {
        let program = self.stubs.program_for(cap)?;
        let context = match &mut self.current {
            Some(entry) => &mut entry.context,
            None => &mut self.fallback_context,
        };
        Ok(context.expand(&program, params)?)
    }

    /// `tparm` under its historical name
    pub fn tparm(&mut self, cap: &[u8], params: &[Parameter]) -> Result<Vec<u8>, Error> {
        self.expand(cap, params)
    }

    /// Termcap cursor addressing: `tgoto(cap, col, row)` expands with
    /// the row first
    pub fn tgoto(&mut self, cap: &[u8], col: i32, row: i32) -> Result<Vec<u8>, Error> {
        self.expand(cap, &[Parameter::from(row), Parameter::from(col)])
    }

    /// Register a callback invoked after each applied padding delay
    pub fn set_flush(&mut self, flush: impl FnMut() + 'static) {
        self.flush = Some(Box::new(flush));
    }

    /// Emit an expanded string byte by byte, honoring `$<…>` padding
    ///
    /// A directive sleeps when the terminal has `npc` set or no pad
    /// character, and otherwise emits `(ms × baudrate) / 9000` pad bytes
    /// (9 bits of line time per byte: 7 data bits plus parity and stop).
    /// Every applied delay ends with a NUL marker byte and triggers the
    /// registered flush callback. `affected_lines` scales directives
    /// carrying `*`.
    pub fn apply_padding(
        &mut self,
        bytes: &[u8],
        affected_lines: i32,
        emit: &mut dyn FnMut(u8),
    ) {
        let mut pos = 0;
        while pos < bytes.len() {
            let byte = bytes[pos];
            if byte == b'$' && bytes.get(pos + 1) == Some(&b'<') {
                match bytes[pos + 2..].iter().position(|b| *b == b'>') {
                    Some(close) => {
                        let inner = &bytes[pos + 2..pos + 2 + close];
                        match parse_padding(inner) {
                            Some(padding) => self.delay(&padding, affected_lines, emit),
                            None => warn!(
                                directive = %String::from_utf8_lossy(inner),
                                "malformed padding directive, skipped"
                            ),
                        }
                        pos += close + 3;
                        continue;
                    }
                    None => {
                        warn!("unterminated padding directive, emitted verbatim");
                        // Fall through and emit the bytes as they are.
                    }
                }
            }
            emit(byte);
            pos += 1;
        }
    }

    fn delay(&mut self, padding: &Padding, affected_lines: i32, emit: &mut dyn FnMut(u8)) {
        let mut tenths = padding.tenths;
        if padding.proportional {
            tenths = tenths.saturating_mul(affected_lines.max(0) as u64);
        }

        match self.pad_byte() {
            None => thread::sleep(Duration::from_micros(tenths.saturating_mul(100))),
            Some(pad) => {
                let baudrate = self.current().map_or(0, |entry| entry.baudrate.max(0)) as u64;
                let count = tenths * baudrate / 90_000;
                for _ in 0..count {
                    emit(pad);
                }
            }
        }
        // End-of-delay marker
        emit(0);
        if let Some(flush) = &mut self.flush {
            flush();
        }
    }

    /// The pad byte, unless the terminal wants real sleeps
    fn pad_byte(&self) -> Option<u8> {
        let entry = self.current()?;
        if let Some(cap) = entry.terminfo.get("npc")
            && cap.value == CapValue::Boolean(true)
        {
            return None;
        }
        let cap = entry.variable.get("PC")?;
        let CapValue::String(raw) = &cap.value else {
            return None;
        };
        escape_byte(raw).map(|(byte, _)| byte)
    }

    /// Preload the stub cache from a text file, one raw capability
    /// source per line
    pub fn load_stubs_text(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let text = fs::read_to_string(path.as_ref())?;
        for line in text.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match compile(line.as_bytes()) {
                Ok(program) => self.stubs.insert(line.as_bytes().to_vec(), program),
                Err(error) => warn!(cap = line, %error, "stub does not compile, skipped"),
            }
        }
        Ok(())
    }

    /// Preload the stub cache from its blob form
    pub fn load_stubs_blob(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let blob = fs::read(path.as_ref())?;
        let (programs, _): (HashMap<Vec<u8>, Program>, usize) =
            bincode::serde::decode_from_slice(&blob, bincode::config::standard())
                .map_err(|_| Error::BadStubs)?;
        for (cap, program) in programs {
            self.stubs.insert(cap, program);
        }
        Ok(())
    }

    /// Persist the stub cache, as text or blob per the options
    pub fn save_stubs(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        if self.options.stubs_as_text {
            let mut text = String::new();
            for cap in self.stubs.programs.keys() {
                text.push_str(&String::from_utf8_lossy(cap));
                text.push('\n');
            }
            fs::write(path.as_ref(), text)?;
        } else {
            let programs: HashMap<&Vec<u8>, &Program> = self
                .stubs
                .programs
                .iter()
                .map(|(cap, program)| (cap, program.as_ref()))
                .collect();
            let blob = bincode::serde::encode_to_vec(&programs, bincode::config::standard())
                .map_err(|_| Error::BadStubs)?;
            fs::write(path.as_ref(), blob)?;
        }
        Ok(())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn tri_flag(value: Option<&CapValue>) -> i32 {
    match value {
        None => 0,
        Some(CapValue::Boolean(true)) => 1,
        Some(CapValue::Boolean(false)) => 0,
        Some(_) => -1,
    }
}

fn tri_number(value: Option<&CapValue>) -> i32 {
    match value {
        None => -1,
        Some(CapValue::Numeric(number)) => *number,
        Some(_) => -2,
    }
}

fn tri_string(value: Option<&CapValue>) -> StringQuery<'_> {
    match value {
        None => StringQuery::Absent,
        Some(CapValue::String(bytes)) => StringQuery::Present(bytes),
        Some(_) => StringQuery::WrongType,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TABLE: &str = "\
auto_right_margin\tam\tbool\tam\t-\t-\tYB\tautomatic margins
columns\tcols\tnum\tco\t-\t-\tYBCGE\tnumber of columns
bell\tbel\tstr\tbl\t-\t-\tYB-G-\taudible signal
cursor_address\tcup\tstr\tcm\t-\t-\tYBCGE\tmove to row col
cursor_up\tcuu1\tstr\tup\t-\t-\tYBCGE\tup one line
pad_char\tpad\tstr\tpc\t-\t-\tYBCGE\tpadding char
no_pad_char\tnpc\tbool\tNP\t-\t-\t-\tpad character does not exist
";

    const SOURCE: &str = "\
dumb|80-column dumb tty,
\tam,
\tcols#80,
\tbel=^G,

padded|terminal with a pad character,
\tcup=\\E[%i%p1%d;%p2%dH,
\tpad=\\377, cuu1=\\EA,
";

    fn runtime() -> Runtime {
        let mut runtime = Runtime::with_options(Options::default().with_term("dumb"));
        runtime.load_translation_text(TABLE);
        runtime.load_database_text(SOURCE).unwrap();
        runtime
    }

    #[test]
    fn tgetent_codes() {
        let mut empty = Runtime::with_options(Options::default());
        assert_eq!(empty.tgetent("dumb"), -1);

        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("nothing"), 0);
        assert_eq!(runtime.tgetent("dumb"), 1);
    }

    #[test]
    fn select_default_falls_back_to_dumb() {
        let mut runtime = Runtime::with_options(Options::default().with_term("missing"));
        runtime.load_translation_text(TABLE);
        runtime.load_database_text(SOURCE).unwrap();
        runtime.select_default(None).unwrap();
        assert_eq!(runtime.current().unwrap().aliases, ["dumb"]);
    }

    #[test]
    fn queries_without_selection() {
        let runtime = Runtime::with_options(Options::default());
        assert!(!runtime.get_flag_termcap("am"));
        assert_eq!(runtime.get_flag_terminfo("am"), 0);
        assert_eq!(runtime.get_number_termcap("co"), -1);
        assert_eq!(runtime.get_number_terminfo("cols"), -1);
        assert_eq!(runtime.get_string_termcap("bl", None), None);
        assert_eq!(runtime.get_string_terminfo("bel"), StringQuery::Absent);
    }

    #[test]
    fn flag_queries() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("dumb"), 1);
        assert!(runtime.get_flag_termcap("am"));
        assert!(!runtime.get_flag_termcap("zz"));
        assert_eq!(runtime.get_flag_terminfo("am"), 1);
        assert_eq!(runtime.get_flag_terminfo("cols"), -1);
        assert_eq!(runtime.get_flag_terminfo("absent"), 0);
    }

    #[test]
    fn number_queries() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("dumb"), 1);
        assert_eq!(runtime.get_number_termcap("co"), 80);
        assert_eq!(runtime.get_number_termcap("bl"), -1);
        assert_eq!(runtime.get_number_terminfo("cols"), 80);
        assert_eq!(runtime.get_number_terminfo("bel"), -2);
        assert_eq!(runtime.get_number_terminfo("absent"), -1);
    }

    #[test]
    fn string_queries_and_area() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("dumb"), 1);

        let mut area = Area::new();
        assert_eq!(
            runtime.get_string_termcap("bl", Some(&mut area)),
            Some(b"^G".as_slice())
        );
        assert_eq!(area.as_bytes(), b"^G");
        assert_eq!(area.position(), 2);

        // A second hit appends at the cursor.
        runtime.get_string_termcap("bl", Some(&mut area));
        assert_eq!(area.as_bytes(), b"^G^G");
        assert_eq!(area.position(), 4);

        assert_eq!(runtime.get_string_termcap("co", None), None);
        assert_eq!(
            runtime.get_string_terminfo("bel"),
            StringQuery::Present(b"^G".as_slice())
        );
        assert_eq!(runtime.get_string_terminfo("cols"), StringQuery::WrongType);
        assert_eq!(runtime.get_string_terminfo("nope"), StringQuery::Absent);
    }

    #[test]
    fn variable_queries() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("padded"), 1);
        assert_eq!(
            runtime.get_string_variable("PC"),
            StringQuery::Present(b"\\377".as_slice())
        );
        assert_eq!(
            runtime.get_string_variable("UP"),
            StringQuery::Present(b"\\EA".as_slice())
        );
        assert_eq!(runtime.get_string_variable("BC"), StringQuery::Absent);
        assert!(runtime.get_number_variable("baudrate") >= 0);
        assert_eq!(runtime.get_number_variable("columns"), -1);
    }

    #[test]
    fn expand_cursor_address() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("padded"), 1);
        let cup = runtime
            .get_string_terminfo("cup")
            .bytes()
            .unwrap()
            .to_vec();
        let expanded = runtime
            .expand(&cup, &[Parameter::from(18), Parameter::from(40)])
            .unwrap();
        assert_eq!(expanded, b"\x1B[19;41H");
    }

    #[test]
    fn tgoto_swaps_arguments() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("padded"), 1);
        let expanded = runtime
            .tgoto(b"\\E[%i%p1%d;%p2%dH", 40, 18)
            .unwrap();
        assert_eq!(expanded, b"\x1B[19;41H");
    }

    #[test]
    fn static_variables_persist_across_expand_calls() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("dumb"), 1);
        runtime
            .expand(b"%p1%PA", &[Parameter::from(7)])
            .unwrap();
        let out = runtime.expand(b"%gA%d", &[]).unwrap();
        assert_eq!(out, b"7");
        // Selecting again resets the banks.
        assert_eq!(runtime.tgetent("dumb"), 1);
        let out = runtime.expand(b"%gA%d", &[]).unwrap();
        assert_eq!(out, b"0");
    }

    #[test]
    fn padding_with_pad_char() {
        temp_env::with_vars(
            [
                ("TERMINFO_BAUDRATE", Some("45000")),
                ("TERMINFO_OSPEED", None),
            ],
            || {
                let mut runtime = runtime();
                assert_eq!(runtime.tgetent("padded"), 1);
                let mut out = vec![];
                runtime.apply_padding(b"ab$<1>c", 1, &mut |byte| out.push(byte));
                // (1ms × 45000 baud) / 9000 = 5 pad bytes, then the marker
                assert_eq!(out, b"ab\xFF\xFF\xFF\xFF\xFF\x00c");
            },
        );
    }

    #[test]
    fn padding_proportional() {
        temp_env::with_vars(
            [
                ("TERMINFO_BAUDRATE", Some("45000")),
                ("TERMINFO_OSPEED", None),
            ],
            || {
                let mut runtime = runtime();
                assert_eq!(runtime.tgetent("padded"), 1);
                let mut out = vec![];
                runtime.apply_padding(b"$<1*>", 2, &mut |byte| out.push(byte));
                assert_eq!(out, b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF\x00");
            },
        );
    }

    #[test]
    fn padding_without_pad_char_sleeps() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("dumb"), 1);
        let mut out = vec![];
        let start = std::time::Instant::now();
        runtime.apply_padding(b"G$<50>", 1, &mut |byte| out.push(byte));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(out, b"G\x00");
    }

    #[test]
    fn malformed_padding_skipped() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("padded"), 1);
        let mut out = vec![];
        runtime.apply_padding(b"a$<pq>b", 1, &mut |byte| out.push(byte));
        assert_eq!(out, b"ab");
    }

    #[test]
    fn unterminated_padding_verbatim() {
        let mut runtime = runtime();
        assert_eq!(runtime.tgetent("padded"), 1);
        let mut out = vec![];
        runtime.apply_padding(b"a$<5", 1, &mut |byte| out.push(byte));
        assert_eq!(out, b"a$<5");
    }

    #[test]
    fn flush_callback_after_delay() {
        use std::{cell::Cell, rc::Rc};

        temp_env::with_vars([("TERMINFO_BAUDRATE", Some("45000"))], || {
            let mut runtime = runtime();
            assert_eq!(runtime.tgetent("padded"), 1);
            let flushed = Rc::new(Cell::new(0));
            let counter = flushed.clone();
            runtime.set_flush(move || counter.set(counter.get() + 1));
            let mut out = vec![];
            runtime.apply_padding(b"$<1>$<1>", 1, &mut |byte| out.push(byte));
            assert_eq!(flushed.get(), 2);
        });
    }

    #[test]
    fn stub_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stubs.bin");

        let mut rt = runtime();
        rt.expand(b"%p1%d", &[Parameter::from(5)]).unwrap();
        rt.expand(b"%p1%p2%+%d", &[]).unwrap();
        rt.save_stubs(&path).unwrap();

        let mut other = runtime();
        other.load_stubs_blob(&path).unwrap();
        assert_eq!(other.stubs.programs.len(), 2);
        assert!(other.stubs.programs.contains_key(b"%p1%d".as_slice()));
    }

    #[test]
    fn stub_text_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stubs.txt");

        let mut options = Options::default();
        options.stubs_as_text = true;
        let mut rt = Runtime::with_options(options);
        rt.load_translation_text(TABLE);
        rt.load_database_text(SOURCE).unwrap();
        rt.expand(b"%p1%d", &[Parameter::from(5)]).unwrap();
        rt.save_stubs(&path).unwrap();

        let mut other = runtime();
        other.load_stubs_text(&path).unwrap();
        assert!(other.stubs.programs.contains_key(b"%p1%d".as_slice()));
    }
}
