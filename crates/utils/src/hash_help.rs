// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hash map and set aliases.
//!
//! Snare uses [`rapidhash::RapidHashMap`] and [`rapidhash::RapidHashSet`] as stand-ins for
//! `std::collections::HashMap` and `std::collections::HashSet` (they ARE `std::collections::HashMap` and
//! `std::collections::HashSet`, but using the [`rapidhash::fast::RandomState`] hash builder.)
//!
//! The catalog tables are keyed by short rule/macro/list names and rebuilt on every load,
//! which is exactly the small-string-heavy workload `rapidhash` is fast at. We seed the
//! hash builder randomly, so it stays resistant to hash collision attacks.

use rapidhash::RapidRandomState as RandomState;

// These are effectively aliases for `rapidhash::RapidHashMap` and `rapidhash::RapidHashSet`
// They're less of a mouthful, and we avoid type aliasing a type alias
/// A type alias for `[rapidhash::RapidHashMap]`.
pub type RapidMap<K, V> = std::collections::HashMap<K, V, RandomState>;
/// A type alias for `[rapidhash::RapidHashSet]`.
pub type RapidSet<T> = std::collections::HashSet<T, RandomState>;

/// Creates a new `RapidMap` with the specified capacity; returning the initialized map for use.
#[inline(always)]
#[must_use]
pub fn map_with_capacity<K, V>(capacity: usize) -> RapidMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    RapidMap::with_capacity_and_hasher(capacity, RandomState::default())
}

/// Creates a new `RapidSet` with the specified capacity; returning the initialized set for use.
#[inline(always)]
#[must_use]
pub fn set_with_capacity<T>(capacity: usize) -> RapidSet<T>
where
    T: std::hash::Hash + Eq,
{
    RapidSet::with_capacity_and_hasher(capacity, RandomState::default())
}
