// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The catalog: every table the loader passes populate, and the records that
//! live in them.

use crate::priority::Priority;
use crate::schema::{ExceptionValue, ScalarOrSeq};

use snare_ast::{ListTable, MacroTable};
use snare_utils::{RapidMap, RapidSet};

/// A named sequence of literal strings; may reference other lists by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRecord {
    pub name: String,
    pub items: Vec<String>,
    /// Original YAML slice, for diagnostics.
    pub context: String,
}

/// A named filter sub-expression that rules may reference by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroRecord {
    pub name: String,
    pub condition: String,
    pub source: String,
    pub context: String,
}

/// A validated exception, ready for lowering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionItem {
    pub name: String,
    pub fields: ScalarOrSeq<String>,
    pub comps: ScalarOrSeq<String>,
    pub values: Vec<ExceptionValue>,
}

/// A fully validated rule.
#[derive(Clone, Debug)]
pub struct RuleRecord {
    pub name: String,
    pub condition: String,
    pub output: String,
    pub desc: String,
    pub priority: Priority,
    pub source: String,
    pub tags: Vec<String>,
    pub exceptions: Vec<ExceptionItem>,
    pub enabled: bool,
    pub skip_if_unknown_filter: bool,
    pub warn_evttypes: bool,
    /// Original YAML slice, with every appended item's slice concatenated on.
    pub context: String,
    /// Condition with lowered exceptions conjoined; derived in pass 2b.
    pub compile_condition: String,
    /// Fields referenced by this rule's exceptions; derived in pass 2b.
    pub exception_fields: RapidSet<String>,
}

/// Process state for one load call.
///
/// Pass 1 fills the by-name tables and the ordered-name sidecars; pass 2
/// fills the compiled tables and the dense rule index. A rule lives in
/// `rules_by_name` or `skipped_rules_by_name`, never both.
#[derive(Default)]
pub struct Catalog {
    pub macros_by_name: RapidMap<String, MacroRecord>,
    pub lists_by_name: RapidMap<String, ListRecord>,
    pub rules_by_name: RapidMap<String, RuleRecord>,
    /// Rules dropped by the priority gate. Appends targeting them are
    /// silently accepted and `enabled` toggles still apply.
    pub skipped_rules_by_name: RapidMap<String, RuleRecord>,
    /// First-appearance order; compilation iterates these.
    pub ordered_macro_names: Vec<String>,
    pub ordered_list_names: Vec<String>,
    pub ordered_rule_names: Vec<String>,
    /// Dense 1-based rule index: entry `i` owns identifier `i + 1`. Only
    /// rules that compiled against a valid source appear here.
    pub rules_by_idx: Vec<String>,
    pub compiled_macros: MacroTable,
    pub compiled_lists: ListTable,
}

impl Catalog {
    /// High-water mark of assigned rule identifiers.
    pub fn n_rules(&self) -> u32 {
        self.rules_by_idx.len() as u32
    }

    /// Clear everything compilation derives, keeping the pass-1 tables.
    pub fn reset_compiled(&mut self) {
        self.rules_by_idx.clear();
        self.compiled_macros.clear();
        self.compiled_lists.clear();
    }

    /// Store a macro definition, registering the name on first appearance.
    pub(crate) fn store_macro(&mut self, rec: MacroRecord) {
        let name = rec.name.clone();
        if self.macros_by_name.insert(name.clone(), rec).is_none() {
            self.ordered_macro_names.push(name);
        }
    }

    /// Store a list definition, registering the name on first appearance.
    pub(crate) fn store_list(&mut self, rec: ListRecord) {
        let name = rec.name.clone();
        if self.lists_by_name.insert(name.clone(), rec).is_none() {
            self.ordered_list_names.push(name);
        }
    }

    /// Store a rule that passed the priority gate. A redefinition may move
    /// the name over from the skipped table; ordered registration happens
    /// only on the very first loaded appearance.
    pub(crate) fn store_rule(&mut self, rec: RuleRecord) {
        let name = rec.name.clone();
        self.skipped_rules_by_name.remove(&name);
        let first = self.rules_by_name.insert(name.clone(), rec).is_none()
            && !self.ordered_rule_names.contains(&name);
        if first {
            self.ordered_rule_names.push(name);
        }
    }

    /// Store a rule the priority gate dropped. Skipped rules are not
    /// registered in `ordered_rule_names`.
    pub(crate) fn store_skipped_rule(&mut self, rec: RuleRecord) {
        let name = rec.name.clone();
        self.rules_by_name.remove(&name);
        self.skipped_rules_by_name.insert(name, rec);
    }
}
