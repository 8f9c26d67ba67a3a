// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Snare rules core: a two-pass loader for YAML rule documents, an
//! exception lowerer, a dependency-respecting expander, a compilation driver
//! for the host's filter-builder API, and the event dispatcher that maps
//! host-reported matches back to rules.
//!
//! The core is single-threaded and synchronous. A [`RuleSet::load_rules`]
//! call runs to completion (or to the first fatal error) before any event
//! may be dispatched; the host serializes dispatches.
//!
//! ```no_run
//! # use snare_rules::{LoadOptions, RuleSet};
//! # fn demo(host: &mut dyn snare_ast::RulesEngineHost,
//! #         compiler: &dyn snare_ast::FilterCompiler) {
//! let mut rules = RuleSet::new();
//! let content = "- rule: shell_in_container\n  desc: a shell ran\n  condition: evt.type=execve\n  output: shell spawned\n  priority: WARNING\n";
//! let out = rules.load_rules(content, host, compiler, &LoadOptions::default()).unwrap();
//! assert!(out.warnings.is_empty());
//! # }
//! ```

mod catalog;
mod compile;
mod describe;
mod dispatch;
mod error;
mod exceptions;
mod expand;
mod loader;
mod priority;
mod schema;
mod source_map;
mod text;

#[cfg(test)]
pub(crate) mod testutil;

pub use catalog::{Catalog, ExceptionItem, ListRecord, MacroRecord, RuleRecord};
pub use dispatch::{EventInfo, RuleStats};
pub use error::{DescribeError, LoadError, Warning};
pub use exceptions::{COMP_OPERATORS, LIST_COMP_OPERATORS};
pub use priority::{Priority, UnknownPriority};
pub use schema::{
    ExceptionValue, RawException, RawList, RawMacro, RawPluginVersion, RawRule, ScalarOrSeq,
    ScalarText,
};
pub use source_map::SourceMap;

use snare_ast::{FilterCompiler, RulesEngineHost};
use snare_utils::RapidMap;

use std::io::Write;

/// Knobs for a single [`RuleSet::load_rules`] call.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Echo accumulated warnings to stderr once the load finishes.
    pub verbose: bool,
    /// The host will deliver every event type; suppresses the too-broad
    /// event-type-match warning.
    pub all_events: bool,
    /// Extra template appended to (or substituted into) syscall rule
    /// outputs.
    pub extra: String,
    /// Substitute `extra` for `%container.info` instead of the default
    /// container rendering.
    pub replace_container_info: bool,
    /// Rules with a priority strictly less urgent than this are skipped.
    pub min_priority: Priority,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            all_events: false,
            extra: String::new(),
            replace_container_info: false,
            min_priority: Priority::Debug,
        }
    }
}

/// Result of a successful load.
#[derive(Debug, Default)]
pub struct LoadOutput {
    /// Highest engine version any document required; 0 when none did.
    pub required_engine_version: u64,
    /// Plugin name to the ordered versions the documents required.
    /// Satisfaction is the caller's responsibility.
    pub required_plugin_versions: RapidMap<String, Vec<String>>,
    /// Non-fatal diagnostics, in the order they were raised.
    pub warnings: Vec<Warning>,
}

/// A loaded, compiled rule set and its match counters.
#[derive(Default)]
pub struct RuleSet {
    catalog: Catalog,
    stats: RuleStats,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `content`, compose appended definitions, compile every macro and
    /// rule, and install the resulting filters on `host`.
    ///
    /// Every call fully re-initializes the catalog and the match counters;
    /// loads never extend a previous one.
    pub fn load_rules(
        &mut self,
        content: &str,
        host: &mut dyn RulesEngineHost,
        compiler: &dyn FilterCompiler,
        opts: &LoadOptions,
    ) -> Result<LoadOutput, LoadError> {
        self.catalog = Catalog::default();
        self.stats = RuleStats::default();

        let source_map = SourceMap::new(content);
        let mut warnings = Vec::new();
        let pass1 = loader::load_documents(
            &mut self.catalog,
            content,
            &source_map,
            host,
            compiler,
            opts,
            &mut warnings,
        )?;
        compile::compile(&mut self.catalog, host, compiler, opts, &mut warnings)?;

        if opts.verbose {
            for warning in &warnings {
                eprintln!("{warning}");
            }
        }

        Ok(LoadOutput {
            required_engine_version: pass1.required_engine_version,
            required_plugin_versions: pass1.required_plugin_versions,
            warnings,
        })
    }

    /// Attribute a match the host reported for `rule_id` and update the
    /// counters.
    ///
    /// # Panics
    ///
    /// Panics if `rule_id` was not assigned during the last load; that is an
    /// invariant violation, not a recoverable error.
    pub fn on_event(&mut self, rule_id: u32) -> EventInfo {
        dispatch::on_event(&self.catalog, &mut self.stats, rule_id)
    }

    /// Print one rule (or all rules) with its description.
    pub fn describe_rule(&self, name: Option<&str>, w: &mut dyn Write) -> Result<(), DescribeError> {
        describe::describe_rule(&self.catalog, name, w)
    }

    /// Dump the match counters.
    pub fn print_stats(&self, w: &mut dyn Write) -> std::io::Result<()> {
        describe::print_stats(&self.stats, w)
    }

    /// Read-only view of the loaded catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Read-only view of the match counters.
    pub fn stats(&self) -> &RuleStats {
        &self.stats
    }
}
