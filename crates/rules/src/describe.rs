// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Human-readable dumps of rule descriptions and match counters.

use crate::catalog::Catalog;
use crate::dispatch::RuleStats;
use crate::error::DescribeError;
use crate::text::wrap_text;

use std::io::Write;

/// Column the descriptions start in.
const NAME_COL: usize = 50;
/// Wrap width for descriptions.
const DESC_WIDTH: usize = 60;

/// Print one rule (or, with `None`, every loaded rule) with its word-wrapped
/// description. Iteration order over all rules is unspecified.
pub(crate) fn describe_rule(
    catalog: &Catalog,
    name: Option<&str>,
    w: &mut dyn Write,
) -> Result<(), DescribeError> {
    writeln!(w)?;
    writeln!(w, "{:<NAME_COL$} {}", "Rule", "Description")?;
    writeln!(w, "{:<NAME_COL$} {}", "----", "-----------")?;
    match name {
        Some(name) => {
            if !catalog.rules_by_name.contains_key(name) {
                return Err(DescribeError::UnknownRule(name.to_string()));
            }
            describe_single(catalog, name, w)?;
        }
        None => {
            for name in catalog.rules_by_name.keys() {
                describe_single(catalog, name, w)?;
            }
        }
    }
    Ok(())
}

fn describe_single(catalog: &Catalog, name: &str, w: &mut dyn Write) -> std::io::Result<()> {
    let rule = &catalog.rules_by_name[name];
    let wrapped = wrap_text(&rule.desc, DESC_WIDTH);
    // Continuation lines align under the description column.
    let indent = format!("\n{:NAME_COL$} ", "");
    writeln!(w, "{name:<NAME_COL$} {}", wrapped.join(&indent))
}

/// Dump the match counters.
pub(crate) fn print_stats(stats: &RuleStats, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "Events detected: {}", stats.total)?;
    writeln!(w, "Rule counts by severity:")?;
    for (priority, count) in &stats.by_priority {
        writeln!(w, "   {priority}: {count}")?;
    }
    writeln!(w, "Triggered rules by rule name:")?;
    for (name, count) in &stats.by_name {
        writeln!(w, "   {name}: {count}")?;
    }
    Ok(())
}
