// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

/// Error reported by the host runtime across the trait boundary.
///
/// The host is opaque to the core; all we can do with its failures is carry
/// the message (the loader inspects it textually in exactly one place, the
/// `skip-if-unknown-filter` path).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Right-hand side of a relational expression handed to the filter builder.
#[derive(Clone, Copy, Debug)]
pub enum RelArg<'a> {
    /// Unary operators (`exists`) take no argument.
    None,
    /// A single comparison value.
    Value(&'a str),
    /// Harvested element values for the list operators (`in`, `intersects`,
    /// `pmatch`).
    Values(&'a [String]),
}

/// Streaming builder for one rule's filter, owned by the host runtime.
///
/// The compiler driver walks a rule AST and emits `nest`/`unnest`/`bool_op`/
/// `rel_expr` calls in expression order. Any failing call aborts the walk.
pub trait FilterBuilder {
    fn nest(&mut self) -> Result<(), HostError>;
    fn unnest(&mut self) -> Result<(), HostError>;
    fn bool_op(&mut self, op: &str) -> Result<(), HostError>;
    fn rel_expr(&mut self, field: &str, op: &str, arg: RelArg<'_>, index: u32)
    -> Result<(), HostError>;
}

/// The native engine that owns parsers, filter storage, and event delivery.
pub trait RulesEngineHost {
    fn engine_version(&self) -> u64;

    /// Whether `field` is a filter field the given event source defines.
    fn is_defined_field(&self, source: &str, field: &str) -> bool;

    /// Whether `source` names a known event source.
    fn is_source_valid(&self, source: &str) -> bool;

    /// Validate an output format template for `source`.
    fn is_format_valid(&self, source: &str, template: &str) -> Result<(), HostError>;

    /// Drop all installed filters. Called once per load, before compilation.
    fn clear_filters(&mut self);

    /// Create a filter builder for one rule of the given source.
    fn create_parser(&mut self, source: &str) -> Result<Box<dyn FilterBuilder>, HostError>;

    /// Install the built filter, returning the number of distinct event
    /// types it matches.
    fn add_filter(
        &mut self,
        parser: Box<dyn FilterBuilder>,
        rule_name: &str,
        source: &str,
        tags: &[String],
    ) -> Result<u64, HostError>;

    fn enable_rule(&mut self, rule_name: &str, enabled: bool);
}
