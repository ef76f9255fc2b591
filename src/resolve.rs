// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Entry resolution
//!
//! Resolution turns a raw database entry into the three indexed views a
//! terminal is queried through. `use=` references are spliced in place
//! with the historical ncurses semantics: cancellations seen so far
//! suppress inherited capabilities, the first definition of a name wins,
//! and both sets keep accumulating across every `use=` in the chain.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{trace, warn};

use crate::{
    caps::{CapKind, CapTable},
    expand::ExpandContext,
    parse::{CapValue, Capability, Database, Entry},
    speed::Speed,
};

/// Errors reported when resolving an entry
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The name, or a name referenced through `use=`, is not in the
    /// database
    #[error("terminal {0:?} not found")]
    NotFound(String),
    /// A `use=` chain references one of its own ancestors
    #[error("cyclic use= reference through {0:?}")]
    CyclicUse(String),
}

/// A resolved terminal entry with its three indexed views
///
/// The variable bank context lives here so that static variables persist
/// for as long as the terminal stays selected.
#[derive(Debug)]
pub struct ResolvedEntry {
    pub aliases: Vec<String>,
    pub longname: Option<String>,
    /// Capabilities keyed by terminfo name
    pub terminfo: BTreeMap<String, Capability>,
    /// Capabilities keyed by termcap name
    pub termcap: BTreeMap<String, Capability>,
    /// Capabilities keyed by variable name, including the pseudo
    /// variables `PC`, `UP`, `BC`, `ospeed` and `baudrate`
    pub variable: BTreeMap<String, Capability>,
    pub cancellations: BTreeSet<String>,
    pub ospeed: i32,
    pub baudrate: i32,
    pub context: ExpandContext,
}

fn kind_of(value: &CapValue) -> CapKind {
    match value {
        CapValue::Boolean(_) => CapKind::Boolean,
        CapValue::Numeric(_) => CapKind::Numeric,
        CapValue::String(_) => CapKind::String,
    }
}

/// Resolve a terminal by name
pub fn resolve(
    database: &Database,
    table: &CapTable,
    name: &str,
    speed: Speed,
) -> Result<ResolvedEntry, Error> {
    let entry = database
        .find(name)
        .ok_or_else(|| Error::NotFound(name.to_string()))?;

    let mut flat = vec![];
    let mut cancellations = BTreeSet::new();
    let mut featured = BTreeSet::new();
    let mut chain = vec![entry.primary().to_string()];
    walk(
        database,
        entry,
        true,
        &mut chain,
        &mut cancellations,
        &mut featured,
        &mut flat,
    )?;

    let mut resolved = ResolvedEntry {
        aliases: entry.aliases.clone(),
        longname: entry.longname.clone(),
        terminfo: BTreeMap::new(),
        termcap: BTreeMap::new(),
        variable: BTreeMap::new(),
        cancellations,
        ospeed: speed.ospeed,
        baudrate: speed.baudrate,
        context: ExpandContext::new(),
    };

    for cap in flat {
        // Source-level comments survive until this point.
        if cap.name.starts_with('.') {
            continue;
        }
        if resolved.cancellations.contains(&cap.name) {
            continue;
        }
        match table.terminfo(&cap.name) {
            None => {
                trace!(name = %cap.name, "untranslated capability kept in the terminfo view only");
                resolved.terminfo.entry(cap.name.clone()).or_insert(cap);
            }
            Some(row) => {
                if row.kind != kind_of(&cap.value) {
                    warn!(
                        name = %cap.name,
                        table_line = row.line,
                        "capability kind disagrees with the translation table, mapping skipped"
                    );
                    resolved.terminfo.entry(cap.name.clone()).or_insert(cap);
                    continue;
                }
                resolved
                    .terminfo
                    .entry(row.terminfo.clone())
                    .or_insert_with(|| cap.clone());
                if let Some(termcap) = &row.termcap {
                    resolved
                        .termcap
                        .entry(termcap.clone())
                        .or_insert_with(|| cap.clone());
                }
                resolved.variable.entry(row.variable.clone()).or_insert(cap);
            }
        }
    }

    for (pseudo, source) in [
        ("PC", "pad_char"),
        ("UP", "cursor_up"),
        ("BC", "backspace_if_not_bs"),
    ] {
        if let Some(cap) = resolved.variable.get(source) {
            let value = cap.value.clone();
            resolved.variable.insert(
                pseudo.to_string(),
                Capability {
                    name: pseudo.to_string(),
                    value,
                },
            );
        }
    }
    resolved.variable.insert(
        "ospeed".to_string(),
        Capability::numeric("ospeed", speed.ospeed),
    );
    resolved.variable.insert(
        "baudrate".to_string(),
        Capability::numeric("baudrate", speed.baudrate),
    );

    Ok(resolved)
}

/// Flatten an entry in declaration order, splicing `use=` references
///
/// `cancellations` and `featured` are shared across the whole walk; they
/// must not be reset between references.
fn walk(
    database: &Database,
    entry: &Entry,
    top: bool,
    chain: &mut Vec<String>,
    cancellations: &mut BTreeSet<String>,
    featured: &mut BTreeSet<String>,
    out: &mut Vec<Capability>,
) -> Result<(), Error> {
    for cap in &entry.caps {
        if cap.value == CapValue::Boolean(false) {
            cancellations.insert(cap.name.clone());
            continue;
        }
        if cap.name == "use" {
            if let CapValue::String(target) = &cap.value {
                let target_name = String::from_utf8_lossy(target).into_owned();
                let referenced = database
                    .find(&target_name)
                    .ok_or_else(|| Error::NotFound(target_name.clone()))?;
                let primary = referenced.primary().to_string();
                if chain.contains(&primary) {
                    return Err(Error::CyclicUse(primary));
                }
                chain.push(primary);
                walk(database, referenced, false, chain, cancellations, featured, out)?;
                chain.pop();
                continue;
            }
        }
        if featured.contains(&cap.name) {
            // First definition wins.
            continue;
        }
        if !top && cancellations.contains(&cap.name) {
            continue;
        }
        featured.insert(cap.name.clone());
        out.push(cap.clone());
    }
    Ok(())
}
