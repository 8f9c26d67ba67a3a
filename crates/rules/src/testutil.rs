// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared test doubles for unit tests. The integration suite under `tests/`
//! carries its own, richer mocks.

use snare_ast::{
    FilterAst, FilterBuilder, FilterCompiler, FilterError, FilterKind, FilterNode, HostError,
    ListTable, MacroTable, RelArg, RulesEngineHost,
};

use std::cell::RefCell;
use std::rc::Rc;

/// Host with every check permissive and `syscall` as the only valid source.
pub(crate) struct StubHost {
    pub engine_version: u64,
}

impl Default for StubHost {
    fn default() -> Self {
        Self { engine_version: 1 }
    }
}

impl RulesEngineHost for StubHost {
    fn engine_version(&self) -> u64 {
        self.engine_version
    }

    fn is_defined_field(&self, _source: &str, _field: &str) -> bool {
        true
    }

    fn is_source_valid(&self, source: &str) -> bool {
        source == "syscall"
    }

    fn is_format_valid(&self, _source: &str, _template: &str) -> Result<(), HostError> {
        Ok(())
    }

    fn clear_filters(&mut self) {}

    fn create_parser(&mut self, _source: &str) -> Result<Box<dyn FilterBuilder>, HostError> {
        Ok(Box::new(NullBuilder))
    }

    fn add_filter(
        &mut self,
        _parser: Box<dyn FilterBuilder>,
        _rule_name: &str,
        _source: &str,
        _tags: &[String],
    ) -> Result<u64, HostError> {
        Ok(1)
    }

    fn enable_rule(&mut self, _rule_name: &str, _enabled: bool) {}
}

struct NullBuilder;

impl FilterBuilder for NullBuilder {
    fn nest(&mut self) -> Result<(), HostError> {
        Ok(())
    }
    fn unnest(&mut self) -> Result<(), HostError> {
        Ok(())
    }
    fn bool_op(&mut self, _op: &str) -> Result<(), HostError> {
        Ok(())
    }
    fn rel_expr(
        &mut self,
        _field: &str,
        _op: &str,
        _arg: RelArg<'_>,
        _index: u32,
    ) -> Result<(), HostError> {
        Ok(())
    }
}

/// Compiler that wraps the whole condition into a single relational node
/// instead of parsing it. Enough for exercising the loader and driver.
pub(crate) struct StubCompiler;

impl StubCompiler {
    fn ast(kind: FilterKind, condition: &str) -> FilterAst {
        FilterAst {
            kind,
            root: FilterNode::BinaryRelOp {
                left: Box::new(FilterNode::Value(condition.to_string())),
                op: "=".to_string(),
                right: Box::new(FilterNode::Value("1".to_string())),
                index: 0,
            },
        }
    }
}

impl FilterCompiler for StubCompiler {
    fn compile_macro(
        &self,
        condition: &str,
        _macros: &mut MacroTable,
        _lists: &mut ListTable,
    ) -> Result<FilterAst, FilterError> {
        Ok(Self::ast(FilterKind::Macro, condition))
    }

    fn compile_filter(
        &self,
        _name: &str,
        condition: &str,
        _macros: &mut MacroTable,
        _lists: &mut ListTable,
    ) -> Result<FilterAst, FilterError> {
        Ok(Self::ast(FilterKind::Rule, condition))
    }
}

/// What a [`RecordingBuilder`] saw for one `rel_expr` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RecordedArg {
    None,
    Value(String),
    Values(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BuilderOp {
    Nest,
    Unnest,
    BoolOp(String),
    Rel { field: String, op: String, arg: RecordedArg, index: u32 },
}

/// Builder that records the call stream for assertions.
#[derive(Clone, Default)]
pub(crate) struct RecordingBuilder {
    pub ops: Rc<RefCell<Vec<BuilderOp>>>,
}

impl FilterBuilder for RecordingBuilder {
    fn nest(&mut self) -> Result<(), HostError> {
        self.ops.borrow_mut().push(BuilderOp::Nest);
        Ok(())
    }

    fn unnest(&mut self) -> Result<(), HostError> {
        self.ops.borrow_mut().push(BuilderOp::Unnest);
        Ok(())
    }

    fn bool_op(&mut self, op: &str) -> Result<(), HostError> {
        self.ops.borrow_mut().push(BuilderOp::BoolOp(op.to_string()));
        Ok(())
    }

    fn rel_expr(
        &mut self,
        field: &str,
        op: &str,
        arg: RelArg<'_>,
        index: u32,
    ) -> Result<(), HostError> {
        let arg = match arg {
            RelArg::None => RecordedArg::None,
            RelArg::Value(v) => RecordedArg::Value(v.to_string()),
            RelArg::Values(vs) => RecordedArg::Values(vs.to_vec()),
        };
        self.ops.borrow_mut().push(BuilderOp::Rel {
            field: field.to_string(),
            op: op.to_string(),
            arg,
            index,
        });
        Ok(())
    }
}
