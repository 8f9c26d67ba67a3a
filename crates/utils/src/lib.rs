// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
// SPDX-License-Identifier: AGPL-3.0-or-later

mod hash_help;
pub use hash_help::{RapidMap, RapidSet, map_with_capacity, set_with_capacity};
