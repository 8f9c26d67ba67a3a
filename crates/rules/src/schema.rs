// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Serializable document types for the YAML rules format.
//!
//! Pass 1 classifies each top-level mapping by which key it carries and then
//! deserializes it into one of these. Required-field checks happen in the
//! loader, not here, so every field that may legally be absent is an
//! `Option`; the loader owns the error messages.

use schemars::JsonSchema;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A YAML scalar captured as its literal text.
///
/// Rule documents routinely mix bare numbers into string positions (port
/// lists, version pins); the loader treats them all as text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ScalarText(pub String);

impl ScalarText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScalarText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScalarText {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

struct ScalarTextVisitor;

impl Visitor<'_> for ScalarTextVisitor {
    type Value = ScalarText;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, or boolean")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(ScalarText(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(ScalarText(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(ScalarText(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for ScalarText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarTextVisitor)
    }
}

/// Scalar-or-sequence sum for exception `fields` and `comps`.
///
/// The two shapes select entirely different validation and lowering paths,
/// so downstream code dispatches on this tag instead of re-inspecting YAML.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum ScalarOrSeq<T> {
    Scalar(T),
    Seq(Vec<T>),
}

impl<T> ScalarOrSeq<T> {
    pub fn is_seq(&self) -> bool {
        matches!(self, ScalarOrSeq::Seq(_))
    }
}

/// One exception value: a scalar, or a tuple of values.
///
/// Single-field exceptions hold a flat sequence of scalars. Multi-field
/// exceptions hold one tuple per row, whose elements are scalars or (for
/// list-valued columns) tuples of scalars.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum ExceptionValue {
    Scalar(ScalarText),
    Tuple(Vec<ExceptionValue>),
}

/// Declarative exception attached to a rule, before validation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct RawException {
    /// Name of the exception, unique within its rule.
    #[serde(default)]
    pub name: Option<String>,
    /// A single field name, or one field per value column.
    #[serde(default)]
    pub fields: Option<ScalarOrSeq<String>>,
    /// Comparison operator(s), matching `fields` in shape.
    #[serde(default)]
    pub comps: Option<ScalarOrSeq<String>>,
    /// Values tested against `fields`.
    #[serde(default)]
    pub values: Option<Vec<ExceptionValue>>,
}

/// A `macro` document item.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct RawMacro {
    /// Macro name, referenced from rule and macro conditions.
    #[serde(rename = "macro")]
    pub name: String,
    /// Filter-language sub-expression.
    #[serde(default)]
    pub condition: Option<String>,
    /// Event source the macro applies to.
    #[serde(default)]
    pub source: Option<String>,
    /// Extend a previously defined macro instead of replacing it.
    #[serde(default)]
    pub append: bool,
}

/// A `list` document item.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct RawList {
    /// List name, referenced from conditions and other lists.
    #[serde(rename = "list")]
    pub name: String,
    /// Literal items; may name other lists.
    #[serde(default)]
    pub items: Option<Vec<ScalarText>>,
    /// Extend a previously defined list instead of replacing it.
    #[serde(default)]
    pub append: bool,
}

/// A `rule` document item.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct RawRule {
    /// Rule name, unique across the loaded set.
    #[serde(rename = "rule")]
    pub name: String,
    /// Filter-language condition deciding when the rule fires.
    #[serde(default)]
    pub condition: Option<String>,
    /// Human-readable description, shown by the describer.
    #[serde(default)]
    pub desc: Option<String>,
    /// Output format template rendered when the rule fires.
    #[serde(default)]
    pub output: Option<String>,
    /// Severity name, resolved through the priority table.
    #[serde(default)]
    pub priority: Option<String>,
    /// Whether the rule is enabled on the host after loading.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Opt out of the too-broad-event-type-match warning.
    #[serde(default)]
    pub warn_evttypes: Option<bool>,
    /// Tolerate filters over fields this engine build does not know.
    #[serde(default, rename = "skip-if-unknown-filter")]
    pub skip_if_unknown_filter: Option<bool>,
    /// Event source the rule applies to.
    #[serde(default)]
    pub source: Option<String>,
    /// Free-form tags forwarded to the host with the filter.
    #[serde(default)]
    pub tags: Option<Vec<ScalarText>>,
    /// Declarative exceptions, lowered onto the condition at compile time.
    #[serde(default)]
    pub exceptions: Option<Vec<RawException>>,
    /// Extend a previously defined rule instead of replacing it.
    #[serde(default)]
    pub append: bool,
}

/// One entry of a `required_plugin_versions` item.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct RawPluginVersion {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<ScalarText>,
}
