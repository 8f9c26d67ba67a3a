// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::node::FilterAst;

use snare_utils::RapidMap;
use thiserror::Error;

/// Error reported by the external filter compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FilterError(pub String);

impl FilterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A compiled macro, keyed by name in the [`MacroTable`].
///
/// `used` starts false and flips to true, irrevocably, when the compiler
/// substitutes the macro into another expression.
#[derive(Clone, Debug)]
pub struct CompiledMacro {
    pub ast: FilterAst,
    pub used: bool,
}

/// An expanded list, keyed by name in the [`ListTable`].
///
/// Items are fully expanded and quoted; `used` flips when the compiler
/// substitutes the list, or when another list splices it in.
#[derive(Clone, Debug, Default)]
pub struct CompiledList {
    pub items: Vec<String>,
    pub used: bool,
}

pub type MacroTable = RapidMap<String, CompiledMacro>;
pub type ListTable = RapidMap<String, CompiledList>;

/// The lexer/parser for the filter-expression sub-language.
///
/// Compilation receives the macro and list tables mutably: resolving a name
/// reference marks the entry used, which is how the loader later knows which
/// definitions were never referred to.
pub trait FilterCompiler {
    /// Compile a macro's condition into a macro-kind AST.
    fn compile_macro(
        &self,
        condition: &str,
        macros: &mut MacroTable,
        lists: &mut ListTable,
    ) -> Result<FilterAst, FilterError>;

    /// Compile a rule's condition into a rule-kind AST.
    fn compile_filter(
        &self,
        name: &str,
        condition: &str,
        macros: &mut MacroTable,
        lists: &mut ListTable,
    ) -> Result<FilterAst, FilterError>;

    /// Strip trailing newlines from `text`.
    fn trim<'a>(&self, text: &'a str) -> &'a str {
        text.trim_end_matches('\n')
    }
}
