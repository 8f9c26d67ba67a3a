// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt;
use thiserror::Error;

/// Load-time failure. The first fatal error aborts the load.
///
/// Most variants carry the original YAML slice of the offending item and
/// render it under the message:
///
/// ```text
/// <message>
/// ---
/// <original yaml slice>---
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The input could not be parsed as YAML.
    #[error("{message}\n---\n{context}---")]
    Yaml { message: String, context: String },

    /// A document parsed, but is not an array of mappings.
    #[error("{message}\n---\n{context}---")]
    Structure { message: String, context: String },

    /// A required field is missing, or a field has the wrong shape.
    #[error("{message}\n---\n{context}---")]
    Schema { message: String, context: String },

    /// An append or exception composition is ill-formed.
    #[error("{message}\n---\n{context}---")]
    Composition { message: String, context: String },

    /// The filter compiler, the builder walk, or output validation failed.
    #[error("{message}\n---\n{context}---")]
    Compile { message: String, context: String },

    /// The host engine is older than the documents require.
    #[error("Rules require engine version {required}, but engine version is {actual}\n---\n{context}---")]
    EngineVersion {
        required: u64,
        actual: u64,
        context: String,
    },
}

impl LoadError {
    pub(crate) fn structure(message: impl Into<String>, context: impl Into<String>) -> Self {
        LoadError::Structure { message: message.into(), context: context.into() }
    }

    pub(crate) fn schema(message: impl Into<String>, context: impl Into<String>) -> Self {
        LoadError::Schema { message: message.into(), context: context.into() }
    }

    pub(crate) fn composition(message: impl Into<String>, context: impl Into<String>) -> Self {
        LoadError::Composition { message: message.into(), context: context.into() }
    }

    pub(crate) fn compile(message: impl Into<String>, context: impl Into<String>) -> Self {
        LoadError::Compile { message: message.into(), context: context.into() }
    }
}

/// Non-fatal load diagnostic. Warnings accumulate across the whole load and
/// are returned alongside the result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    /// Original YAML slice of the item the warning refers to, when there is
    /// one.
    pub context: Option<String>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), context: None }
    }

    pub fn with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self { message: message.into(), context: Some(context.into()) }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}\n---\n{}---", self.message, context),
            None => f.write_str(&self.message),
        }
    }
}

/// Failure of the describer API.
#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("no such rule: {0}")]
    UnknownRule(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
