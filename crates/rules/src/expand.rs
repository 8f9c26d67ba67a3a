// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pass 2a: expand list-of-list references into the compiled-lists table.

use crate::catalog::Catalog;
use crate::text::quote_item;

use snare_ast::CompiledList;

/// Expand every list in declaration order.
///
/// An item naming a list that was already expanded is spliced in (and marks
/// that list used); anything else is quoted as a literal. Declaration order
/// means a forward reference stays a literal: callers are expected to
/// declare lists in dependency order.
pub(crate) fn expand_lists(catalog: &mut Catalog) {
    let Catalog { ordered_list_names, lists_by_name, compiled_lists, .. } = catalog;

    for name in ordered_list_names.iter() {
        let Some(list) = lists_by_name.get(name) else {
            continue;
        };
        let mut items = Vec::with_capacity(list.items.len());
        for item in &list.items {
            if let Some(sub) = compiled_lists.get_mut(item) {
                sub.used = true;
                items.extend(sub.items.iter().cloned());
            } else {
                items.push(quote_item(item));
            }
        }
        compiled_lists.insert(name.clone(), CompiledList { items, used: false });
    }
}
