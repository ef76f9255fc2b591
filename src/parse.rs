// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parsing terminfo source databases
//!
//! The source database is a textual catalog of terminal entries. Each
//! entry starts with a header line in column 0 (`alias|alias|long name,`)
//! followed by indented feature lines of comma-separated capabilities.
//! String capability values are kept verbatim; escape expansion happens
//! when a capability is compiled for expansion.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind and value of a single capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapValue {
    /// Present boolean; `false` marks a cancellation (`name@` in source)
    Boolean(bool),
    Numeric(i32),
    /// Raw value bytes with source escapes unexpanded
    String(Vec<u8>),
}

/// A single named capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub value: CapValue,
}

impl Capability {
    pub fn boolean(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: CapValue::Boolean(true),
        }
    }

    pub fn numeric(name: &str, value: i32) -> Self {
        Self {
            name: name.to_string(),
            value: CapValue::Numeric(value),
        }
    }

    pub fn string(name: &str, value: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            value: CapValue::String(value.to_vec()),
        }
    }
}

/// One terminal entry, as written in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Short names, at least one; the first one is the primary name
    pub aliases: Vec<String>,
    pub longname: Option<String>,
    /// Capabilities in declaration order, cancellation markers included
    pub caps: Vec<Capability>,
    /// Names cancelled with `name@`
    pub cancellations: BTreeSet<String>,
}

impl Entry {
    /// The primary short name of the entry
    pub fn primary(&self) -> &str {
        &self.aliases[0]
    }

    /// Whether the entry is known under the given alias
    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|alias| alias == name)
    }
}

/// An ordered list of terminal entries
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Database {
    pub entries: Vec<Entry>,
}

/// Errors reported when parsing a source database
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Capability line with no preceding terminal header
    #[error("line {0}: capability data before any terminal header")]
    OrphanFeatures(usize),
    /// Header line not terminated by a comma
    #[error("line {0}: terminal header does not end with a comma")]
    UnterminatedHeader(usize),
    /// Feature line not terminated by a comma
    #[error("line {0}: capability line does not end with a comma")]
    UnterminatedFeatures(usize),
    /// An alias field is empty
    #[error("line {0}: empty alias in terminal header")]
    EmptyAlias(usize),
    /// An alias contains a character outside its class
    #[error("line {0}: invalid character {1:?} in alias {2:?}")]
    InvalidAlias(usize, char, String),
    /// The long name contains a character outside its class
    #[error("line {0}: invalid character {1:?} in long name")]
    InvalidLongname(usize, char),
    /// The same alias appears twice in one header
    #[error("line {0}: duplicate alias {1:?}")]
    DuplicateAlias(usize, String),
    /// A header is not followed by any capability line
    #[error("line {0}: terminal header without capability lines")]
    HeaderWithoutFeatures(usize),
    /// The integer after `#` is not a C-style integer constant
    #[error("line {0}: invalid numeric capability value {1:?}")]
    InvalidNumber(usize, String),
    /// A capability has an empty name
    #[error("line {0}: capability with an empty name")]
    EmptyName(usize),
    /// The blob is not a valid serialized database
    #[error("invalid database blob")]
    BadBlob,
}

/// Parse a source database from text
pub fn parse(text: &str) -> Result<Database, Error> {
    let mut entries: Vec<Entry> = vec![];
    let mut current: Option<(Entry, usize, bool)> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            // Feature line
            let Some((entry, _, seen)) = current.as_mut() else {
                return Err(Error::OrphanFeatures(line_number));
            };
            parse_features(trimmed, line_number, entry)?;
            *seen = true;
        } else {
            // Header line starts a new entry
            if let Some((entry, header_line, seen)) = current.take() {
                if !seen {
                    return Err(Error::HeaderWithoutFeatures(header_line));
                }
                entries.push(entry);
            }
            current = Some((parse_header(line, line_number)?, line_number, false));
        }
    }
    if let Some((entry, header_line, seen)) = current.take() {
        if !seen {
            return Err(Error::HeaderWithoutFeatures(header_line));
        }
        entries.push(entry);
    }

    debug!(entries = entries.len(), "parsed terminfo source database");
    Ok(Database { entries })
}

fn valid_alias_char(c: char) -> bool {
    !c.is_whitespace() && !c.is_control() && c != ',' && c != '/' && c != '|'
}

fn parse_header(line: &str, line_number: usize) -> Result<Entry, Error> {
    let Some(names) = line.strip_suffix(',') else {
        return Err(Error::UnterminatedHeader(line_number));
    };
    let fields: Vec<&str> = names.split('|').collect();

    // The final field of a multi-name header is the long name; it may
    // contain spaces and commas. A lone field is the only alias.
    let (alias_fields, longname) = if fields.len() >= 2 {
        let longname = fields[fields.len() - 1];
        if let Some(c) = longname.chars().find(|c| c.is_control()) {
            return Err(Error::InvalidLongname(line_number, c));
        }
        (&fields[..fields.len() - 1], Some(longname.to_string()))
    } else {
        (&fields[..], None)
    };

    let mut aliases = vec![];
    for field in alias_fields {
        if field.is_empty() {
            return Err(Error::EmptyAlias(line_number));
        }
        if let Some(c) = field.chars().find(|c| !valid_alias_char(*c)) {
            return Err(Error::InvalidAlias(line_number, c, field.to_string()));
        }
        if aliases.iter().any(|a| a == field) {
            return Err(Error::DuplicateAlias(line_number, field.to_string()));
        }
        aliases.push(field.to_string());
    }
    if aliases.is_empty() {
        return Err(Error::EmptyAlias(line_number));
    }

    Ok(Entry {
        aliases,
        longname,
        caps: vec![],
        cancellations: BTreeSet::new(),
    })
}

/// Split a feature line on commas, honoring `\,` escapes in values
fn split_features(line: &str) -> Option<Vec<&str>> {
    let mut features = vec![];
    let mut start = 0;
    let mut escaped = false;
    let mut terminated = false;
    for (pos, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                terminated = false;
            }
            ',' => {
                features.push(&line[start..pos]);
                start = pos + 1;
                terminated = true;
            }
            _ => terminated = false,
        }
    }
    // The grammar requires the trailing comma.
    if !terminated || start != line.len() {
        return None;
    }
    Some(features)
}

fn parse_features(line: &str, line_number: usize, entry: &mut Entry) -> Result<(), Error> {
    let Some(features) = split_features(line) else {
        return Err(Error::UnterminatedFeatures(line_number));
    };
    for feature in features {
        // The comma separator may be followed by whitespace.
        let feature = feature.trim_start();
        if feature.is_empty() {
            continue;
        }
        let cap = parse_feature(feature, line_number)?;
        if cap.value == CapValue::Boolean(false) {
            entry.cancellations.insert(cap.name.clone());
        }
        entry.caps.push(cap);
    }
    Ok(())
}

fn parse_feature(feature: &str, line_number: usize) -> Result<Capability, Error> {
    // The name runs to the first `=` or `#`; neither may appear in it.
    match feature.find(['=', '#']) {
        Some(pos) if feature.as_bytes()[pos] == b'=' => {
            let name = &feature[..pos];
            if name.is_empty() {
                return Err(Error::EmptyName(line_number));
            }
            Ok(Capability::string(name, feature[pos + 1..].as_bytes()))
        }
        Some(pos) => {
            let name = &feature[..pos];
            if name.is_empty() {
                return Err(Error::EmptyName(line_number));
            }
            let value = parse_number(&feature[pos + 1..])
                .ok_or_else(|| Error::InvalidNumber(line_number, feature[pos + 1..].to_string()))?;
            Ok(Capability::numeric(name, value))
        }
        None => {
            if let Some(name) = feature.strip_suffix('@') {
                if name.is_empty() {
                    return Err(Error::EmptyName(line_number));
                }
                Ok(Capability {
                    name: name.to_string(),
                    value: CapValue::Boolean(false),
                })
            } else {
                Ok(Capability::boolean(feature))
            }
        }
    }
}

/// Parse a C-style integer constant: hex, octal, decimal or a quoted
/// character, with an optional `u`/`l` suffix
fn parse_number(text: &str) -> Option<i32> {
    let text = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(inner) = text.strip_prefix('\'') {
        let inner = inner.strip_suffix('\'')?;
        let bytes = inner.as_bytes();
        let (value, used) = crate::compile::escape_byte(bytes)?;
        if used != bytes.len() {
            return None;
        }
        return Some(i32::from(value));
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i32::from_str_radix(hex, 16).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return i32::from_str_radix(&text[1..], 8).ok();
    }
    text.parse().ok()
}

impl Database {
    /// Find an entry by alias; the first match wins
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.has_alias(name))
    }

    /// Write the database back out as source text
    ///
    /// Parsing the result yields an equal database: aliases, long names
    /// and the ordered capability list all survive the round trip.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.aliases.join("|"));
            if let Some(longname) = &entry.longname {
                out.push('|');
                out.push_str(longname);
            }
            out.push_str(",\n");
            for cap in &entry.caps {
                out.push('\t');
                out.push_str(&cap.name);
                match &cap.value {
                    CapValue::Boolean(true) => {}
                    CapValue::Boolean(false) => out.push('@'),
                    CapValue::Numeric(value) => {
                        out.push('#');
                        out.push_str(&value.to_string());
                    }
                    CapValue::String(value) => {
                        out.push('=');
                        out.push_str(&String::from_utf8_lossy(value));
                    }
                }
                out.push_str(",\n");
            }
        }
        out
    }

    /// Serialize to the pre-parsed blob encoding
    pub fn to_blob(&self) -> Result<Vec<u8>, Error> {
        bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|_| Error::BadBlob)
    }

    /// Load a database from the pre-parsed blob encoding
    pub fn from_blob(blob: &[u8]) -> Result<Self, Error> {
        let (database, _) = bincode::serde::decode_from_slice(blob, bincode::config::standard())
            .map_err(|_| Error::BadBlob)?;
        Ok(database)
    }
}
