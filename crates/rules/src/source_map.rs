// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Line-oriented view of the raw rules text.
//!
//! The YAML parser hands back plain data with no provenance, so diagnostics
//! reconstruct the offending slice from the text itself: pass 1 counts
//! top-level items as it walks the documents, and the source map knows the
//! line each item started on.

/// Non-empty lines of the rules text plus the 1-based line index at which
/// each top-level document item begins.
#[derive(Clone, Debug, Default)]
pub struct SourceMap {
    lines: Vec<String>,
    indices: Vec<usize>,
}

impl SourceMap {
    pub fn new(content: &str) -> Self {
        let mut lines = Vec::new();
        let mut indices = Vec::new();
        for raw in content.split('\n') {
            if raw.is_empty() {
                continue;
            }
            // A top-level item starts with `-` at column zero. `---` is a
            // document separator, not an item.
            if raw.starts_with('-') && !raw.starts_with("---") {
                indices.push(lines.len() + 1);
            }
            lines.push(raw.to_string());
        }
        // Sentinel simplifies slicing the final item.
        indices.push(lines.len() + 1);
        Self { lines, indices }
    }

    /// Number of top-level items seen in the text.
    pub fn n_items(&self) -> usize {
        self.indices.len() - 1
    }

    /// Reconstruct the original YAML slice of the `item`-th top-level item
    /// (0-based), for attaching to a catalog record.
    pub fn item_context(&self, item: usize) -> String {
        match self.indices.get(item) {
            Some(&row) if item < self.n_items() => self.context_at(row),
            _ => String::new(),
        }
    }

    /// Reconstruct the slice beginning at 1-based line `row`: every line up
    /// to (but excluding) the next line that starts a new item or document,
    /// each with a trailing newline.
    pub fn context_at(&self, row: usize) -> String {
        let mut ret = String::new();
        let mut idx = row;
        while idx >= 1 && idx <= self.lines.len() {
            ret.push_str(&self.lines[idx - 1]);
            ret.push('\n');
            idx += 1;
            if idx > self.lines.len() || self.lines[idx - 1].starts_with('-') {
                break;
            }
        }
        ret
    }
}
