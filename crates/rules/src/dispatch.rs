// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Event demultiplexing: from a relational-node index back to the rule that
//! matched.

use crate::catalog::Catalog;

use snare_utils::{RapidMap, RapidSet};

/// Match counters, updated on every dispatched event.
#[derive(Debug, Default)]
pub struct RuleStats {
    pub total: u64,
    pub by_priority: RapidMap<String, u64>,
    pub by_name: RapidMap<String, u64>,
}

/// Everything the host needs to render one rule match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventInfo {
    pub rule: String,
    pub priority_num: u8,
    /// Output template, `*`-prefixed to mark it permissive for the
    /// downstream formatter.
    pub format: String,
    pub exception_fields: RapidSet<String>,
    pub tags: Vec<String>,
}

/// Attribute a match reported by the host.
///
/// `rule_id` must be an identifier assigned during the last load; anything
/// else means the host and the catalog disagree, which is fatal.
pub(crate) fn on_event(catalog: &Catalog, stats: &mut RuleStats, rule_id: u32) -> EventInfo {
    let name = rule_id
        .checked_sub(1)
        .and_then(|i| catalog.rules_by_idx.get(i as usize))
        .unwrap_or_else(|| panic!("on_event called with unknown rule id {rule_id}"));
    let rule = catalog
        .rules_by_name
        .get(name)
        .unwrap_or_else(|| panic!("rule {name} owns id {rule_id} but is not in the catalog"));

    stats.total += 1;
    *stats.by_priority.entry(rule.priority.to_string()).or_default() += 1;
    *stats.by_name.entry(rule.name.clone()).or_default() += 1;

    EventInfo {
        rule: rule.name.clone(),
        priority_num: rule.priority.as_num(),
        format: format!("*{}", rule.output),
        exception_fields: rule.exception_fields.clone(),
        tags: rule.tags.clone(),
    }
}
