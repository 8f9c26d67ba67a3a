// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Exception validation and lowering.
//!
//! Exceptions are declarative records; at compile time each one is lowered
//! into a boolean fragment and conjoined onto the rule's condition as
//! ` and not <fragment>`. The lowered text is re-parsed by the filter
//! compiler along with the rest of the condition.

use crate::catalog::{ExceptionItem, RuleRecord};
use crate::error::LoadError;
use crate::schema::{ExceptionValue, RawException, ScalarOrSeq};
use crate::text::{paren_item, quote_item};

use snare_ast::RulesEngineHost;
use snare_utils::RapidSet;

/// Comparison operators the exception schema accepts.
pub const COMP_OPERATORS: &[&str] = &[
    "=",
    "==",
    "!=",
    "<=",
    ">=",
    "<",
    ">",
    "contains",
    "icontains",
    "glob",
    "startswith",
    "endswith",
    "in",
    "intersects",
    "pmatch",
];

/// The subset of operators whose right-hand side is a list.
pub const LIST_COMP_OPERATORS: &[&str] = &["in", "intersects", "pmatch"];

/// Validate one declarative exception against the host's field set,
/// applying the shape-dependent defaults for `comps`.
pub(crate) fn validate_exception(
    raw: RawException,
    source: &str,
    host: &dyn RulesEngineHost,
    context: &str,
) -> Result<ExceptionItem, LoadError> {
    let Some(name) = raw.name else {
        return Err(LoadError::schema(
            "Rule exception item must have name property",
            context,
        ));
    };
    let Some(fields) = raw.fields else {
        return Err(LoadError::schema(
            format!("Rule exception item {name} must have fields property"),
            context,
        ));
    };
    let values = raw.values.unwrap_or_default();

    let comps = match &fields {
        ScalarOrSeq::Seq(field_names) => {
            let comps = match raw.comps {
                None => vec!["=".to_string(); field_names.len()],
                Some(ScalarOrSeq::Seq(comps)) => {
                    if comps.len() != field_names.len() {
                        return Err(LoadError::schema(
                            format!(
                                "Rule exception item {name}: fields and comps lists must have equal length"
                            ),
                            context,
                        ));
                    }
                    comps
                }
                Some(ScalarOrSeq::Scalar(_)) => {
                    return Err(LoadError::schema(
                        format!("Rule exception item {name}: fields and comps must both be lists"),
                        context,
                    ));
                }
            };
            for field in field_names {
                check_field(&name, field, source, host, context)?;
            }
            for comp in &comps {
                check_comp(&name, comp, context)?;
            }
            ScalarOrSeq::Seq(comps)
        }
        ScalarOrSeq::Scalar(field) => {
            let comp = match raw.comps {
                None => "in".to_string(),
                Some(ScalarOrSeq::Scalar(comp)) => comp,
                Some(ScalarOrSeq::Seq(_)) => {
                    return Err(LoadError::schema(
                        format!(
                            "Rule exception item {name}: fields and comps must both be strings"
                        ),
                        context,
                    ));
                }
            };
            check_field(&name, field, source, host, context)?;
            check_comp(&name, &comp, context)?;
            ScalarOrSeq::Scalar(comp)
        }
    };

    Ok(ExceptionItem { name, fields, comps, values })
}

fn check_field(
    name: &str,
    field: &str,
    source: &str,
    host: &dyn RulesEngineHost,
    context: &str,
) -> Result<(), LoadError> {
    if host.is_defined_field(source, field) {
        Ok(())
    } else {
        Err(LoadError::schema(
            format!("Rule exception item {name}: field name {field} is not a supported filter field"),
            context,
        ))
    }
}

fn check_comp(name: &str, comp: &str, context: &str) -> Result<(), LoadError> {
    if COMP_OPERATORS.contains(&comp) {
        Ok(())
    } else {
        Err(LoadError::schema(
            format!(
                "Rule exception item {name}: comparison operator {comp} is not a supported comparison operator"
            ),
            context,
        ))
    }
}

/// Lower a rule's exceptions, producing the derived compile condition and
/// the set of fields the exceptions reference.
pub(crate) fn build_compile_condition(
    rule: &RuleRecord,
) -> Result<(String, RapidSet<String>), LoadError> {
    let mut econd = String::new();
    let mut fields = RapidSet::default();

    for eitem in &rule.exceptions {
        match &eitem.fields {
            ScalarOrSeq::Scalar(field) => {
                fields.insert(field.clone());
            }
            ScalarOrSeq::Seq(field_names) => {
                fields.extend(field_names.iter().cloned());
            }
        }
        let icond = if eitem.fields.is_seq() {
            lower_multi(eitem, &rule.context)?
        } else {
            lower_single(eitem, &rule.context)?
        };
        if !icond.is_empty() {
            econd.push_str(" and not ");
            econd.push_str(&icond);
        }
    }

    let compile_condition = if econd.is_empty() {
        rule.condition.clone()
    } else {
        format!("({}){econd}", rule.condition)
    };
    Ok((compile_condition, fields))
}

/// `(F C (v1, v2, ...))` with quoted values; empty values lower to nothing.
fn lower_single(eitem: &ExceptionItem, context: &str) -> Result<String, LoadError> {
    let (ScalarOrSeq::Scalar(field), ScalarOrSeq::Scalar(comp)) = (&eitem.fields, &eitem.comps)
    else {
        panic!("single-field lowering on a multi-field exception {}", eitem.name);
    };

    let mut values = String::new();
    for (i, value) in eitem.values.iter().enumerate() {
        let ExceptionValue::Scalar(text) = value else {
            return Err(LoadError::composition(
                format!(
                    "Expected values array for item {} to contain a list of strings",
                    eitem.name
                ),
                context,
            ));
        };
        if i > 0 {
            values.push_str(", ");
        }
        values.push_str(&quote_item(text.as_str()));
    }

    if values.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("({field} {comp} ({values}))"))
}

/// `((F1 C1 V1 and F2 C2 V2) or (...) or ...)`; one inner conjunction per
/// value row. A tuple column renders as a quoted `(...)` list; a scalar
/// column under a list operator gets parenthesized, otherwise quoted.
fn lower_multi(eitem: &ExceptionItem, context: &str) -> Result<String, LoadError> {
    let (ScalarOrSeq::Seq(field_names), ScalarOrSeq::Seq(comps)) = (&eitem.fields, &eitem.comps)
    else {
        panic!("multi-field lowering on a single-field exception {}", eitem.name);
    };

    let mut conditions: Vec<String> = Vec::new();
    for row in &eitem.values {
        let cols = match row {
            ExceptionValue::Tuple(cols) if cols.len() == field_names.len() => cols,
            _ => {
                return Err(LoadError::composition(
                    format!(
                        "Rule exception item {}: fields and values lists must have equal length",
                        eitem.name
                    ),
                    context,
                ));
            }
        };

        let mut inner = String::new();
        for (k, field) in field_names.iter().enumerate() {
            if k > 0 {
                inner.push_str(" and ");
            }
            let rendered = match &cols[k] {
                ExceptionValue::Tuple(parts) => {
                    let mut list = String::from("(");
                    for (i, part) in parts.iter().enumerate() {
                        let ExceptionValue::Scalar(text) = part else {
                            return Err(LoadError::composition(
                                format!(
                                    "Rule exception item {}: value lists cannot be nested",
                                    eitem.name
                                ),
                                context,
                            ));
                        };
                        if i > 0 {
                            list.push_str(", ");
                        }
                        list.push_str(&quote_item(text.as_str()));
                    }
                    list.push(')');
                    list
                }
                ExceptionValue::Scalar(text) => {
                    if LIST_COMP_OPERATORS.contains(&comps[k].as_str()) {
                        paren_item(text.as_str())
                    } else {
                        quote_item(text.as_str())
                    }
                }
            };
            inner.push_str(field);
            inner.push(' ');
            inner.push_str(&comps[k]);
            inner.push(' ');
            inner.push_str(&rendered);
        }
        conditions.push(format!("({inner})"));
    }

    if conditions.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("({})", conditions.join(" or ")))
}
