// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Boundary types between the rules core, the external filter compiler, and
//! the host runtime.
//!
//! The core never parses the filter-expression sub-language and never owns
//! filter storage. It talks to two collaborators through the traits defined
//! here: a [`FilterCompiler`] that turns condition text into a [`FilterAst`],
//! and a [`RulesEngineHost`] that owns parsers, filters, event-type mapping,
//! and output-formatter validation.

mod compiler;
mod host;
mod node;

pub use compiler::{CompiledList, CompiledMacro, FilterCompiler, FilterError, ListTable, MacroTable};
pub use host::{FilterBuilder, HostError, RelArg, RulesEngineHost};
pub use node::{FilterAst, FilterKind, FilterNode};
