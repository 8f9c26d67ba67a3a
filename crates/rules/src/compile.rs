// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pass 2b: compile macros and rules in declaration order and drive the
//! host's filter-builder API.

use crate::LoadOptions;
use crate::catalog::Catalog;
use crate::error::{LoadError, Warning};
use crate::exceptions::{LIST_COMP_OPERATORS, build_compile_condition};
use crate::expand::expand_lists;
use crate::loader::DEFAULT_SOURCE;

use snare_ast::{
    CompiledMacro, FilterBuilder, FilterCompiler, FilterKind, FilterNode, HostError, RelArg,
    RulesEngineHost,
};

pub(crate) fn compile(
    catalog: &mut Catalog,
    host: &mut dyn RulesEngineHost,
    compiler: &dyn FilterCompiler,
    opts: &LoadOptions,
    warnings: &mut Vec<Warning>,
) -> Result<(), LoadError> {
    // Reset filter-side state and everything compilation derives; the
    // pass-1 by-name tables stay.
    host.clear_filters();
    catalog.reset_compiled();

    expand_lists(catalog);
    compile_macros(catalog, compiler)?;
    compile_rules(catalog, host, compiler, opts, warnings)?;
    warn_unused(catalog, warnings);
    Ok(())
}

fn compile_macros(catalog: &mut Catalog, compiler: &dyn FilterCompiler) -> Result<(), LoadError> {
    for name in catalog.ordered_macro_names.clone() {
        let Some(m) = catalog.macros_by_name.get(&name) else {
            continue;
        };
        let (condition, context) = (m.condition.clone(), m.context.clone());
        let ast = compiler
            .compile_macro(&condition, &mut catalog.compiled_macros, &mut catalog.compiled_lists)
            .map_err(|e| {
                LoadError::compile(
                    format!("Compilation error when compiling \"{condition}\": {e}"),
                    context,
                )
            })?;
        catalog.compiled_macros.insert(name, CompiledMacro { ast, used: false });
    }
    Ok(())
}

fn compile_rules(
    catalog: &mut Catalog,
    host: &mut dyn RulesEngineHost,
    compiler: &dyn FilterCompiler,
    opts: &LoadOptions,
    warnings: &mut Vec<Warning>,
) -> Result<(), LoadError> {
    for name in catalog.ordered_rule_names.clone() {
        let Some(rule) = catalog.rules_by_name.get(&name) else {
            continue;
        };

        let (compile_condition, exception_fields) = build_compile_condition(rule)?;
        let rule = {
            let rule = catalog.rules_by_name.get_mut(&name).expect("rule looked up above");
            rule.compile_condition = compile_condition;
            rule.exception_fields = exception_fields;
            rule.clone()
        };

        let mut ast = compiler
            .compile_filter(
                &name,
                &rule.compile_condition,
                &mut catalog.compiled_macros,
                &mut catalog.compiled_lists,
            )
            .map_err(|e| {
                LoadError::compile(
                    format!(
                        "Compilation error when compiling \"{}\": {e}",
                        rule.compile_condition
                    ),
                    rule.context.clone(),
                )
            })?;

        if ast.kind != FilterKind::Rule {
            return Err(LoadError::compile(
                format!("Unexpected compilation result for rule {name}: not a rule filter"),
                rule.context.clone(),
            ));
        }

        if !host.is_source_valid(&rule.source) {
            warnings.push(Warning::new(format!(
                "Rule {name}: warning (unknown-source): unknown source {}, skipping",
                rule.source
            )));
            continue;
        }

        // The rule now owns the next dense identifier; every relational node
        // carries it so matches can be attributed in O(1).
        catalog.rules_by_idx.push(name.clone());
        let index = catalog.n_rules();
        ast.root.stamp_index(index);

        let mut parser = host
            .create_parser(&rule.source)
            .map_err(|e| LoadError::compile(e.to_string(), rule.context.clone()))?;
        if let Err(err) = install_filter(&ast.root, parser.as_mut(), None) {
            if rule.skip_if_unknown_filter && err.to_string().contains("nonexistent field") {
                warnings.push(Warning::new(format!(
                    "Rule {name}: warning (unknown-field): {err}"
                )));
                continue;
            }
            return Err(LoadError::compile(
                format!("Error installing rule {name}: {err}"),
                rule.context.clone(),
            ));
        }

        let num_evttypes = host
            .add_filter(parser, &name, &rule.source, &rule.tags)
            .map_err(|e| LoadError::compile(e.to_string(), rule.context.clone()))?;
        if rule.source == DEFAULT_SOURCE
            && rule.warn_evttypes
            && !opts.all_events
            && (num_evttypes == 0 || num_evttypes > 100)
        {
            warnings.push(Warning::new(format!(
                "Rule {name}: warning (no-evttype): matches too many evt.type values ({num_evttypes}), which has a significant performance penalty"
            )));
        }

        host.enable_rule(&name, rule.enabled);

        let output = rewrite_output(&rule.output, &rule.source, opts);
        host.is_format_valid(&rule.source, &output).map_err(|e| {
            LoadError::compile(
                format!("Invalid output format '{output}': {e}"),
                rule.context.clone(),
            )
        })?;
        catalog.rules_by_name.get_mut(&name).expect("rule looked up above").output = output;
    }
    Ok(())
}

fn warn_unused(catalog: &Catalog, warnings: &mut Vec<Warning>) {
    for name in &catalog.ordered_macro_names {
        if catalog.compiled_macros.get(name).is_some_and(|m| !m.used) {
            warnings.push(Warning::new(format!(
                "macro {name} not referred to by any rule/macro"
            )));
        }
    }
    for name in &catalog.ordered_list_names {
        if catalog.compiled_lists.get(name).is_some_and(|l| !l.used) {
            warnings.push(Warning::new(format!(
                "list {name} not referred to by any rule/macro/list"
            )));
        }
    }
}

/// Rewrite `%container.info` in syscall rule outputs.
///
/// With `replace_container_info` the caller's `extra` template substitutes
/// the placeholder outright; otherwise the placeholder becomes the default
/// container rendering and `extra` (when non-empty) is appended. Outputs
/// without the placeholder get ` extra` appended.
fn rewrite_output(output: &str, source: &str, opts: &LoadOptions) -> String {
    if source != DEFAULT_SOURCE {
        return output.to_string();
    }
    if output.contains("%container.info") {
        if opts.replace_container_info {
            return output.replace("%container.info", &opts.extra);
        }
        let mut out = output.replace("%container.info", "%container.name (id=%container.id)");
        if !opts.extra.is_empty() {
            out.push(' ');
            out.push_str(&opts.extra);
        }
        out
    } else if opts.extra.is_empty() {
        output.to_string()
    } else {
        format!("{output} {}", opts.extra)
    }
}

/// Walk a rule AST and emit the filter-builder call stream.
///
/// Nesting is never necessary between identical successive boolean
/// operators: they are associative, so eliding the `nest`/`unnest` pair
/// preserves semantics while saving the host a level of bookkeeping.
fn install_filter(
    node: &FilterNode,
    builder: &mut dyn FilterBuilder,
    parent_op: Option<&str>,
) -> Result<(), HostError> {
    match node {
        FilterNode::BinaryBoolOp { op, left, right } => {
            let nested = parent_op != Some(op.as_str());
            if nested {
                builder.nest()?;
            }
            install_filter(left, builder, Some(op))?;
            builder.bool_op(op)?;
            install_filter(right, builder, Some(op))?;
            if nested {
                builder.unnest()?;
            }
            Ok(())
        }
        FilterNode::UnaryBoolOp { op, arg } => {
            builder.nest()?;
            builder.bool_op(op)?;
            install_filter(arg, builder, None)?;
            builder.unnest()
        }
        FilterNode::BinaryRelOp { left, op, right, index } => {
            if LIST_COMP_OPERATORS.contains(&op.as_str()) {
                let FilterNode::List(elements) = right.as_ref() else {
                    panic!("list operator {op} without a list right-hand side: {right:?}");
                };
                let values: Vec<String> =
                    elements.iter().map(|el| el.value().to_string()).collect();
                builder.rel_expr(left.value(), op, RelArg::Values(&values), *index)
            } else {
                builder.rel_expr(left.value(), op, RelArg::Value(right.value()), *index)
            }
        }
        FilterNode::UnaryRelOp { op, arg, index } => {
            builder.rel_expr(arg.value(), op, RelArg::None, *index)
        }
        other => panic!("unexpected node type in filter walk: {other:?}"),
    }
}
