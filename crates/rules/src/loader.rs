// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pass 1: walk the parsed YAML documents and populate the catalog.
//!
//! Each top-level mapping is classified by which recognized key it carries,
//! validated structurally, and stored; `append` items are instead composed
//! onto a previous definition. Nothing is compiled here; pass 2 consumes the
//! tables this pass builds.

use crate::LoadOptions;
use crate::catalog::{Catalog, ListRecord, MacroRecord, RuleRecord};
use crate::error::{LoadError, Warning};
use crate::exceptions::validate_exception;
use crate::priority::{Priority, UnknownPriority};
use crate::schema::{RawList, RawMacro, RawPluginVersion, RawRule};
use crate::source_map::SourceMap;

use snare_ast::{FilterCompiler, RulesEngineHost};
use snare_utils::{RapidMap, RapidSet};

use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use std::sync::OnceLock;

/// Event source applied when an item does not name one.
pub(crate) const DEFAULT_SOURCE: &str = "syscall";

#[derive(Debug, Default)]
pub(crate) struct Pass1Output {
    pub required_engine_version: u64,
    pub required_plugin_versions: RapidMap<String, Vec<String>>,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn load_documents(
    catalog: &mut Catalog,
    content: &str,
    source_map: &SourceMap,
    host: &dyn RulesEngineHost,
    compiler: &dyn FilterCompiler,
    opts: &LoadOptions,
    warnings: &mut Vec<Warning>,
) -> Result<Pass1Output, LoadError> {
    let mut out = Pass1Output::default();
    let mut item_idx = 0usize;

    for document in serde_yaml::Deserializer::from_str(content) {
        let doc = Value::deserialize(document).map_err(|e| yaml_error(&e, source_map))?;
        let items = match doc {
            Value::Null => continue,
            Value::Sequence(items) => items,
            _ => {
                return Err(LoadError::structure(
                    "Rules content is not yaml array of objects",
                    source_map.context_at(1),
                ));
            }
        };
        for item in items {
            let context = source_map.item_context(item_idx);
            item_idx += 1;
            load_item(catalog, &item, context, host, compiler, opts, &mut out, warnings)?;
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn load_item(
    catalog: &mut Catalog,
    item: &Value,
    context: String,
    host: &dyn RulesEngineHost,
    compiler: &dyn FilterCompiler,
    opts: &LoadOptions,
    out: &mut Pass1Output,
    warnings: &mut Vec<Warning>,
) -> Result<(), LoadError> {
    if !item.is_mapping() {
        return Err(LoadError::structure(
            format!(
                "Unexpected element of type {}. Each element should be a yaml associative array.",
                yaml_type_name(item)
            ),
            context,
        ));
    }

    // Classification is by key presence, in this precedence order.
    if let Some(version) = item.get("required_engine_version") {
        load_engine_version(version, host, &context, out)
    } else if let Some(entries) = item.get("required_plugin_versions") {
        load_plugin_versions(entries, &context, out)
    } else if item.get("macro").is_some() {
        load_macro(catalog, item, context)
    } else if item.get("list").is_some() {
        load_list(catalog, item, context)
    } else if item.get("rule").is_some() {
        load_rule(catalog, item, context, host, compiler, opts, warnings)
    } else {
        warnings.push(Warning::with_context("Unknown top level object", context));
        Ok(())
    }
}

fn load_engine_version(
    version: &Value,
    host: &dyn RulesEngineHost,
    context: &str,
    out: &mut Pass1Output,
) -> Result<(), LoadError> {
    let Some(required) = version.as_u64() else {
        return Err(LoadError::schema(
            "Value of required_engine_version must be a number",
            context,
        ));
    };
    let actual = host.engine_version();
    if actual < required {
        return Err(LoadError::EngineVersion { required, actual, context: context.to_string() });
    }
    out.required_engine_version = out.required_engine_version.max(required);
    Ok(())
}

fn load_plugin_versions(
    entries: &Value,
    context: &str,
    out: &mut Pass1Output,
) -> Result<(), LoadError> {
    let entries: Vec<RawPluginVersion> = serde_yaml::from_value(entries.clone()).map_err(|e| {
        LoadError::schema(
            format!("Value of required_plugin_versions must be a list of name/version objects: {e}"),
            context,
        )
    })?;
    for entry in entries {
        let Some(name) = entry.name else {
            return Err(LoadError::schema(
                "Plugin version item must have name property",
                context,
            ));
        };
        let Some(version) = entry.version else {
            return Err(LoadError::schema(
                format!("Plugin version item for plugin {name} must have version property"),
                context,
            ));
        };
        out.required_plugin_versions.entry(name).or_default().push(version.0);
    }
    Ok(())
}

fn load_macro(catalog: &mut Catalog, item: &Value, context: String) -> Result<(), LoadError> {
    let raw: RawMacro = serde_yaml::from_value(item.clone())
        .map_err(|e| LoadError::schema(e.to_string(), context.as_str()))?;
    let Some(condition) = raw.condition else {
        return Err(LoadError::schema("Item has no mapping for key 'condition'", context));
    };

    if raw.append {
        let Some(existing) = catalog.macros_by_name.get_mut(&raw.name) else {
            return Err(LoadError::composition(
                format!(
                    "Macro {} has 'append' key but no macro by that name already exists",
                    raw.name
                ),
                context,
            ));
        };
        existing.condition.push(' ');
        existing.condition.push_str(&condition);
        existing.context.push('\n');
        existing.context.push_str(&context);
    } else {
        catalog.store_macro(MacroRecord {
            name: raw.name,
            condition,
            source: raw.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            context,
        });
    }
    Ok(())
}

fn load_list(catalog: &mut Catalog, item: &Value, context: String) -> Result<(), LoadError> {
    let raw: RawList = serde_yaml::from_value(item.clone())
        .map_err(|e| LoadError::schema(e.to_string(), context.as_str()))?;
    let Some(items) = raw.items else {
        return Err(LoadError::schema("Item has no mapping for key 'items'", context));
    };
    let items: Vec<String> = items.into_iter().map(|s| s.0).collect();

    if raw.append {
        let Some(existing) = catalog.lists_by_name.get_mut(&raw.name) else {
            return Err(LoadError::composition(
                format!(
                    "List {} has 'append' key but no list by that name already exists",
                    raw.name
                ),
                context,
            ));
        };
        existing.items.extend(items);
        existing.context.push('\n');
        existing.context.push_str(&context);
    } else {
        catalog.store_list(ListRecord { name: raw.name, items, context });
    }
    Ok(())
}

fn load_rule(
    catalog: &mut Catalog,
    item: &Value,
    context: String,
    host: &dyn RulesEngineHost,
    compiler: &dyn FilterCompiler,
    opts: &LoadOptions,
    warnings: &mut Vec<Warning>,
) -> Result<(), LoadError> {
    let raw: RawRule = serde_yaml::from_value(item.clone())
        .map_err(|e| LoadError::schema(e.to_string(), context.as_str()))?;
    if raw.append {
        append_rule(catalog, raw, context, host, warnings)
    } else {
        define_rule(catalog, raw, context, host, compiler, opts)
    }
}

fn define_rule(
    catalog: &mut Catalog,
    raw: RawRule,
    context: String,
    host: &dyn RulesEngineHost,
    compiler: &dyn FilterCompiler,
    opts: &LoadOptions,
) -> Result<(), LoadError> {
    let required = [
        ("condition", raw.condition.is_some()),
        ("output", raw.output.is_some()),
        ("desc", raw.desc.is_some()),
        ("priority", raw.priority.is_some()),
    ];
    for (key, present) in required {
        if !present {
            // An item missing required fields but carrying `enabled` is a
            // toggle for an already defined rule.
            return match raw.enabled {
                Some(enabled) => toggle_enabled(catalog, &raw.name, enabled, &context),
                None => Err(LoadError::schema(
                    format!("Item has no mapping for key '{key}'"),
                    context,
                )),
            };
        }
    }

    let priority: Priority = raw
        .priority
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|e: UnknownPriority| LoadError::schema(e.to_string(), context.as_str()))?;
    let source = raw.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let mut exceptions = Vec::new();
    for eitem in raw.exceptions.unwrap_or_default() {
        exceptions.push(validate_exception(eitem, &source, host, &context)?);
    }

    let mut rule = RuleRecord {
        name: raw.name,
        condition: raw.condition.unwrap_or_default(),
        output: raw.output.unwrap_or_default(),
        desc: raw.desc.unwrap_or_default(),
        priority,
        source,
        tags: raw.tags.unwrap_or_default().into_iter().map(|t| t.0).collect(),
        exceptions,
        enabled: raw.enabled.unwrap_or(true),
        skip_if_unknown_filter: raw.skip_if_unknown_filter.unwrap_or(false),
        warn_evttypes: raw.warn_evttypes.unwrap_or(true),
        context,
        compile_condition: String::new(),
        exception_fields: RapidSet::default(),
    };

    if priority.as_num() <= opts.min_priority.as_num() {
        rule.output = compiler.trim(&rule.output).to_string();
        catalog.store_rule(rule);
    } else {
        catalog.store_skipped_rule(rule);
    }
    Ok(())
}

fn toggle_enabled(
    catalog: &mut Catalog,
    name: &str,
    enabled: bool,
    context: &str,
) -> Result<(), LoadError> {
    if let Some(rule) = catalog.rules_by_name.get_mut(name) {
        rule.enabled = enabled;
    } else if let Some(rule) = catalog.skipped_rules_by_name.get_mut(name) {
        rule.enabled = enabled;
    } else {
        return Err(LoadError::composition(
            format!("Rule {name} has 'enabled' key but no rule by that name already exists"),
            context,
        ));
    }
    Ok(())
}

fn append_rule(
    catalog: &mut Catalog,
    raw: RawRule,
    context: String,
    host: &dyn RulesEngineHost,
    warnings: &mut Vec<Warning>,
) -> Result<(), LoadError> {
    let Some(rule) = catalog.rules_by_name.get_mut(&raw.name) else {
        // The priority gate dropped the base rule: drop the addition too.
        if catalog.skipped_rules_by_name.contains_key(&raw.name) {
            return Ok(());
        }
        return Err(LoadError::composition(
            format!(
                "Rule {} has 'append' key but no rule by that name already exists",
                raw.name
            ),
            context,
        ));
    };

    if raw.condition.is_none() && raw.exceptions.is_none() {
        return Err(LoadError::composition(
            "Appended rule must have exceptions or condition property",
            context,
        ));
    }

    let source = rule.source.clone();
    for eitem in raw.exceptions.unwrap_or_default() {
        let Some(ename) = eitem.name.clone() else {
            return Err(LoadError::schema(
                "Rule exception item must have name property",
                context,
            ));
        };
        if let Some(existing) = rule.exceptions.iter_mut().find(|e| e.name == ename) {
            // Only values may be appended to an existing exception.
            if eitem.fields.is_some() || eitem.comps.is_some() {
                return Err(LoadError::composition(
                    format!(
                        "Appended exception item {ename} cannot have fields or comps properties"
                    ),
                    context,
                ));
            }
            existing.values.extend(eitem.values.unwrap_or_default());
        } else if eitem.fields.is_some() {
            // A full definition under a new name is a fresh exception.
            rule.exceptions.push(validate_exception(eitem, &source, host, &context)?);
        } else {
            warnings.push(Warning::with_context(
                format!(
                    "Rule {} with append exception item {ename}, but no exception by that name already exists. Values will be ignored.",
                    rule.name
                ),
                context.clone(),
            ));
        }
    }

    if let Some(condition) = raw.condition {
        rule.condition.push(' ');
        rule.condition.push_str(&condition);
    }
    rule.context.push('\n');
    rule.context.push_str(&context);
    Ok(())
}

fn yaml_error(err: &serde_yaml::Error, map: &SourceMap) -> LoadError {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| Regex::new(r"^(\d+):(\d+): ").expect("static regex"));

    let mut message = err.to_string();
    let mut row = err.location().map(|l| l.line());
    // Some parser messages arrive prefixed with `<row>:<col>: `; strip the
    // prefix and render the context at that row instead.
    let captured_row = prefix.captures(&message).and_then(|c| c[1].parse().ok());
    if captured_row.is_some() {
        row = captured_row;
        message = prefix.replace(&message, "").into_owned();
    }
    let context = row.map(|r| map.context_at(r)).unwrap_or_default();
    LoadError::Yaml { message, context }
}

fn yaml_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
