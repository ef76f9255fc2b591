// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Capability translation table
//!
//! The table maps every capability between its three names: the terminfo
//! name, the two-letter termcap name and the long variable name. It is
//! loaded from a whitespace-separated text file with one row per
//! capability, plus `capalias`/`infoalias` rows declaring alternate
//! spellings.

use std::{collections::HashMap, fs, path::Path};

use tracing::{debug, trace, warn};

/// Kind of a capability value
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub enum CapKind {
    Boolean,
    Numeric,
    String,
}

impl CapKind {
    fn from_column(column: &str) -> Option<Self> {
        match column {
            "bool" => Some(CapKind::Boolean),
            "num" => Some(CapKind::Numeric),
            "str" => Some(CapKind::String),
            _ => None,
        }
    }
}

/// One row of the translation table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapRow {
    /// Long variable name, e.g. `cursor_address`
    pub variable: String,
    /// Terminfo name, e.g. `cup`
    pub terminfo: String,
    /// Termcap name, e.g. `cm`; `None` when the table has `-`
    pub termcap: Option<String>,
    pub kind: CapKind,
    /// Line in the table file, kept for diagnostics
    pub line: usize,
}

/// Errors reported when loading a translation table
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The table file could not be read
    #[error("I/O error")]
    IO(#[from] std::io::Error),
}

/// The translation table with its three indexes
///
/// Lookups go through [`CapTable::terminfo`], [`CapTable::termcap`] and
/// [`CapTable::variable`]; alternate spellings declared with `capalias`
/// and `infoalias` rows resolve to the same row as the canonical name.
#[derive(Debug, Default)]
pub struct CapTable {
    rows: Vec<CapRow>,
    by_terminfo: HashMap<String, usize>,
    by_termcap: HashMap<String, usize>,
    by_variable: HashMap<String, usize>,
}

impl CapTable {
    /// Load the table from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "loading capability translation table");
        Ok(Self::parse(&text))
    }

    /// Parse the table from text
    ///
    /// Malformed rows and rows with an unknown type are skipped with a
    /// warning, so parsing itself cannot fail.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        // Alias rows may precede the row they refer to.
        let mut cap_aliases: Vec<(String, String, usize)> = vec![];
        let mut info_aliases: Vec<(String, String, usize)> = vec![];

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = line.trim_end();
            if line.is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.first().copied() {
                Some("capalias") | Some("infoalias") => {
                    if columns.len() < 3 {
                        warn!(line_number, "alias row with too few columns, skipped");
                        continue;
                    }
                    let alias = (columns[1].to_string(), columns[2].to_string(), line_number);
                    if columns[0] == "capalias" {
                        cap_aliases.push(alias);
                    } else {
                        info_aliases.push(alias);
                    }
                }
                _ => table.parse_row(&columns, line_number),
            }
        }

        for (alias, name, line_number) in cap_aliases {
            if name == "-" {
                trace!(%alias, "ignored termcap alias");
                continue;
            }
            match table.row_for_name(&name) {
                Some(row) => {
                    table.by_termcap.entry(alias).or_insert(row);
                }
                None => warn!(line_number, %alias, %name, "capalias for unknown capability"),
            }
        }
        for (alias, name, line_number) in info_aliases {
            if name == "-" {
                trace!(%alias, "ignored terminfo alias");
                continue;
            }
            match table.by_terminfo.get(&name).copied() {
                Some(row) => {
                    table.by_terminfo.entry(alias).or_insert(row);
                }
                None => warn!(line_number, %alias, %name, "infoalias for unknown capability"),
            }
        }

        debug!(rows = table.rows.len(), "capability translation table ready");
        table
    }

    fn parse_row(&mut self, columns: &[&str], line: usize) {
        // <variable> <terminfo> <type> <termcap> <keyname> <keyvalue>
        // <translation> <description>; only the first four matter here.
        if columns.len() < 4 {
            warn!(line_number = line, "translation row with too few columns, skipped");
            return;
        }
        let Some(kind) = CapKind::from_column(columns[2]) else {
            warn!(
                line_number = line,
                kind = columns[2],
                "unknown capability type, row skipped"
            );
            return;
        };
        let termcap = match columns[3] {
            "-" => None,
            name => Some(name.to_string()),
        };
        let row = CapRow {
            variable: columns[0].to_string(),
            terminfo: columns[1].to_string(),
            termcap,
            kind,
            line,
        };
        let index = self.rows.len();
        self.by_variable.entry(row.variable.clone()).or_insert(index);
        self.by_terminfo.entry(row.terminfo.clone()).or_insert(index);
        if let Some(termcap) = &row.termcap {
            self.by_termcap.entry(termcap.clone()).or_insert(index);
        }
        self.rows.push(row);
    }

    fn row_for_name(&self, name: &str) -> Option<usize> {
        self.by_termcap
            .get(name)
            .or_else(|| self.by_terminfo.get(name))
            .copied()
    }

    /// Look up a row by terminfo name
    pub fn terminfo(&self, name: &str) -> Option<&CapRow> {
        self.by_terminfo.get(name).map(|i| &self.rows[*i])
    }

    /// Look up a row by termcap name
    pub fn termcap(&self, name: &str) -> Option<&CapRow> {
        self.by_termcap.get(name).map(|i| &self.rows[*i])
    }

    /// Look up a row by variable name
    pub fn variable(&self, name: &str) -> Option<&CapRow> {
        self.by_variable.get(name).map(|i| &self.rows[*i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
