// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Integration-test collaborators: an in-memory host runtime that records
//! every filter-builder call, and a minimal recursive-descent parser for the
//! filter sub-language standing in for the external compiler.

use snare_ast::{
    FilterAst, FilterBuilder, FilterCompiler, FilterError, FilterKind, FilterNode, HostError,
    ListTable, MacroTable, RelArg, RulesEngineHost,
};
use snare_rules::{LoadError, LoadOptions, LoadOutput, RuleSet};
use snare_utils::{RapidMap, RapidSet};

use std::cell::RefCell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Mock host
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedArg {
    None,
    Value(String),
    Values(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuilderOp {
    Nest,
    Unnest,
    BoolOp(String),
    Rel { field: String, op: String, arg: RecordedArg, index: u32 },
}

#[derive(Clone, Debug)]
pub struct InstalledFilter {
    pub name: String,
    pub source: String,
    pub tags: Vec<String>,
    pub ops: Vec<BuilderOp>,
}

pub struct MockHost {
    pub engine_version: u64,
    pub defined_fields: RapidSet<String>,
    pub valid_sources: RapidSet<String>,
    /// Filters installed via `add_filter`, in installation order.
    pub filters: Vec<InstalledFilter>,
    /// Last `enable_rule` state per rule.
    pub enabled: RapidMap<String, bool>,
    /// Per-rule `num_evttypes` override; defaults to 1.
    pub evttypes: RapidMap<String, u64>,
    /// Substrings that make an output template invalid.
    pub invalid_formats: Vec<String>,
    pub cleared: usize,
    pending: Option<Rc<RefCell<Vec<BuilderOp>>>>,
}

impl Default for MockHost {
    fn default() -> Self {
        let mut defined_fields = RapidSet::default();
        for field in [
            "evt.type",
            "proc.name",
            "proc.cmdline",
            "fd.name",
            "fd.num",
            "fd.directory",
            "container.id",
            "user.name",
        ] {
            defined_fields.insert(field.to_string());
        }
        let mut valid_sources = RapidSet::default();
        valid_sources.insert("syscall".to_string());
        valid_sources.insert("k8s_audit".to_string());
        Self {
            engine_version: 10,
            defined_fields,
            valid_sources,
            filters: Vec::new(),
            enabled: RapidMap::default(),
            evttypes: RapidMap::default(),
            invalid_formats: Vec::new(),
            cleared: 0,
            pending: None,
        }
    }
}

impl MockHost {
    /// The call stream recorded for the rule installed under `name`.
    pub fn ops_for(&self, name: &str) -> &[BuilderOp] {
        &self
            .filters
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("no filter installed for rule {name}"))
            .ops
    }
}

struct MockBuilder {
    ops: Rc<RefCell<Vec<BuilderOp>>>,
    fields: RapidSet<String>,
}

impl FilterBuilder for MockBuilder {
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
        if !self.fields.contains(field) {
            return Err(HostError::new(format!(
                "filter_check called with nonexistent field {field}"
            )));
        }
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

impl RulesEngineHost for MockHost {
    fn engine_version(&self) -> u64 {
        self.engine_version
    }

    fn is_defined_field(&self, _source: &str, field: &str) -> bool {
        self.defined_fields.contains(field)
    }

    fn is_source_valid(&self, source: &str) -> bool {
        self.valid_sources.contains(source)
    }

    fn is_format_valid(&self, _source: &str, template: &str) -> Result<(), HostError> {
        for bad in &self.invalid_formats {
            if template.contains(bad) {
                return Err(HostError::new(format!("invalid format string: {template}")));
            }
        }
        Ok(())
    }

    fn clear_filters(&mut self) {
        self.filters.clear();
        self.cleared += 1;
    }

    fn create_parser(&mut self, _source: &str) -> Result<Box<dyn FilterBuilder>, HostError> {
        let ops = Rc::new(RefCell::new(Vec::new()));
        self.pending = Some(ops.clone());
        Ok(Box::new(MockBuilder { ops, fields: self.defined_fields.clone() }))
    }

    fn add_filter(
        &mut self,
        _parser: Box<dyn FilterBuilder>,
        rule_name: &str,
        source: &str,
        tags: &[String],
    ) -> Result<u64, HostError> {
        let ops = self.pending.take().map(|o| o.borrow().clone()).unwrap_or_default();
        self.filters.push(InstalledFilter {
            name: rule_name.to_string(),
            source: source.to_string(),
            tags: tags.to_vec(),
            ops,
        });
        Ok(self.evttypes.get(rule_name).copied().unwrap_or(1))
    }

    fn enable_rule(&mut self, rule_name: &str, enabled: bool) {
        self.enabled.insert(rule_name.to_string(), enabled);
    }
}

// ---------------------------------------------------------------------------
// Test filter compiler
// ---------------------------------------------------------------------------

/// Recursive-descent parser for the subset of the filter grammar the tests
/// use: `and`/`or`/`not`, parentheses, relational operators, `exists`, value
/// lists, macro references by bare name, and list references inside value
/// lists.
pub struct TestCompiler;

impl FilterCompiler for TestCompiler {
    fn compile_macro(
        &self,
        condition: &str,
        macros: &mut MacroTable,
        lists: &mut ListTable,
    ) -> Result<FilterAst, FilterError> {
        let root = parse(condition, macros, lists)?;
        Ok(FilterAst { kind: FilterKind::Macro, root })
    }

    fn compile_filter(
        &self,
        _name: &str,
        condition: &str,
        macros: &mut MacroTable,
        lists: &mut ListTable,
    ) -> Result<FilterAst, FilterError> {
        let root = parse(condition, macros, lists)?;
        Ok(FilterAst { kind: FilterKind::Rule, root })
    }
}

const NAMED_OPS: &[&str] = &[
    "contains",
    "icontains",
    "glob",
    "startswith",
    "endswith",
    "in",
    "intersects",
    "pmatch",
];
const LIST_OPS: &[&str] = &["in", "intersects", "pmatch"];

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    LParen,
    RParen,
    Comma,
    Op(String),
    Word(String),
    Quoted(String),
}

fn lex(input: &str) -> Result<Vec<Tok>, FilterError> {
    let mut toks = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            ',' => {
                chars.next();
                toks.push(Tok::Comma);
            }
            '"' | '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == c => break,
                        Some(ch) => s.push(ch),
                        None => return Err(FilterError::new("unterminated quoted string")),
                    }
                }
                toks.push(Tok::Quoted(s));
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Op("==".to_string()));
                } else {
                    toks.push(Tok::Op("=".to_string()));
                }
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(FilterError::new("expected '=' after '!'"));
                }
                toks.push(Tok::Op("!=".to_string()));
            }
            '<' | '>' => {
                chars.next();
                let mut op = c.to_string();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    op.push('=');
                }
                toks.push(Tok::Op(op));
            }
            _ => {
                let mut s = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || "(),=!<>\"'".contains(ch) {
                        break;
                    }
                    s.push(ch);
                    chars.next();
                }
                toks.push(Tok::Word(s));
            }
        }
    }
    Ok(toks)
}

struct Parser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    macros: &'a mut MacroTable,
    lists: &'a mut ListTable,
}

fn parse(
    input: &str,
    macros: &mut MacroTable,
    lists: &mut ListTable,
) -> Result<FilterNode, FilterError> {
    let mut parser = Parser { toks: lex(input)?, pos: 0, macros, lists };
    let node = parser.parse_or()?;
    if parser.pos != parser.toks.len() {
        return Err(FilterError::new(format!(
            "trailing tokens after expression in \"{input}\""
        )));
    }
    Ok(node)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<FilterNode, FilterError> {
        let mut left = self.parse_and()?;
        while self.eat_word("or") {
            let right = self.parse_and()?;
            left = FilterNode::BinaryBoolOp {
                op: "or".to_string(),
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterNode, FilterError> {
        let mut left = self.parse_not()?;
        while self.eat_word("and") {
            let right = self.parse_not()?;
            left = FilterNode::BinaryBoolOp {
                op: "and".to_string(),
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<FilterNode, FilterError> {
        if self.eat_word("not") {
            let arg = self.parse_not()?;
            Ok(FilterNode::UnaryBoolOp { op: "not".to_string(), arg: Box::new(arg) })
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<FilterNode, FilterError> {
        match self.advance() {
            Some(Tok::LParen) => {
                let node = self.parse_or()?;
                match self.advance() {
                    Some(Tok::RParen) => Ok(node),
                    _ => Err(FilterError::new("expected ')'")),
                }
            }
            Some(Tok::Word(word)) => self.parse_after_ident(word),
            other => Err(FilterError::new(format!("unexpected token: {other:?}"))),
        }
    }

    fn parse_after_ident(&mut self, ident: String) -> Result<FilterNode, FilterError> {
        match self.peek().cloned() {
            Some(Tok::Op(op)) => {
                self.pos += 1;
                let value = self.parse_value()?;
                Ok(FilterNode::BinaryRelOp {
                    left: Box::new(FilterNode::Value(ident)),
                    op,
                    right: Box::new(FilterNode::Value(value)),
                    index: 0,
                })
            }
            Some(Tok::Word(w)) if w == "exists" => {
                self.pos += 1;
                Ok(FilterNode::UnaryRelOp {
                    op: "exists".to_string(),
                    arg: Box::new(FilterNode::Value(ident)),
                    index: 0,
                })
            }
            Some(Tok::Word(w)) if NAMED_OPS.contains(&w.as_str()) => {
                self.pos += 1;
                if LIST_OPS.contains(&w.as_str()) {
                    let elements = self.parse_value_list()?;
                    Ok(FilterNode::BinaryRelOp {
                        left: Box::new(FilterNode::Value(ident)),
                        op: w,
                        right: Box::new(FilterNode::List(elements)),
                        index: 0,
                    })
                } else {
                    let value = self.parse_value()?;
                    Ok(FilterNode::BinaryRelOp {
                        left: Box::new(FilterNode::Value(ident)),
                        op: w,
                        right: Box::new(FilterNode::Value(value)),
                        index: 0,
                    })
                }
            }
            _ => {
                // A bare identifier is a macro reference.
                let Some(m) = self.macros.get_mut(&ident) else {
                    return Err(FilterError::new(format!(
                        "Undefined macro '{ident}' used in filter"
                    )));
                };
                m.used = true;
                Ok(m.ast.root.clone())
            }
        }
    }

    fn parse_value(&mut self) -> Result<String, FilterError> {
        match self.advance() {
            Some(Tok::Word(w)) => Ok(w),
            Some(Tok::Quoted(q)) => Ok(q),
            other => Err(FilterError::new(format!("expected a value, found {other:?}"))),
        }
    }

    fn parse_value_list(&mut self) -> Result<Vec<FilterNode>, FilterError> {
        if self.advance() != Some(Tok::LParen) {
            return Err(FilterError::new("expected '(' after list operator"));
        }
        let mut elements = Vec::new();
        loop {
            match self.advance() {
                Some(Tok::RParen) => break,
                Some(Tok::Comma) => {}
                Some(Tok::Word(w)) => {
                    if let Some(list) = self.lists.get_mut(&w) {
                        // Splice in the expanded list, un-quoting each item
                        // the way a real parser would.
                        list.used = true;
                        elements.extend(
                            list.items.iter().map(|item| FilterNode::Value(strip_quotes(item))),
                        );
                    } else {
                        elements.push(FilterNode::Value(w));
                    }
                }
                Some(Tok::Quoted(q)) => elements.push(FilterNode::Value(q)),
                other => {
                    return Err(FilterError::new(format!(
                        "unexpected token in value list: {other:?}"
                    )));
                }
            }
        }
        Ok(elements)
    }
}

fn strip_quotes(s: &str) -> String {
    let b = s.as_bytes();
    if b.len() >= 2
        && ((b[0] == b'"' && b[b.len() - 1] == b'"') || (b[0] == b'\'' && b[b.len() - 1] == b'\''))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Loading helpers
// ---------------------------------------------------------------------------

pub fn load(content: &str) -> (RuleSet, MockHost, Result<LoadOutput, LoadError>) {
    load_with(content, &LoadOptions::default(), MockHost::default())
}

pub fn load_with(
    content: &str,
    opts: &LoadOptions,
    mut host: MockHost,
) -> (RuleSet, MockHost, Result<LoadOutput, LoadError>) {
    let mut rules = RuleSet::new();
    let result = rules.load_rules(content, &mut host, &TestCompiler, opts);
    (rules, host, result)
}
