// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::collections::HashMap;

/// Drain a map into a vector ordered by key.
pub fn to_ordered_vec<K, T>(source: HashMap<K, T>) -> Vec<T>
where
    K: Ord + Copy,
{
    let mut pairs: Vec<_> = source.into_iter().collect();
    pairs.sort_by_key(|&(key, _)| key);
    pairs.into_iter().map(|(_, value)| value).collect()
}
