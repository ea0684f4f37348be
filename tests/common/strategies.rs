//! Proptest strategies for directory contents

use proptest::prelude::*;
use std::collections::HashSet;

/// File stem safe on every filesystem
pub fn file_stem_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}"
}

/// Eligible and non-eligible file names for one directory
///
/// Eligible names use a random-case `.cif` extension; the others use
/// extensions that must never be picked up.
pub fn directory_contents_strategy() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    (
        prop::collection::hash_set(file_stem_strategy(), 1..16),
        prop::collection::hash_set(file_stem_strategy(), 0..6),
        prop::sample::select(vec!["cif", "CIF", "Cif"]),
        prop::sample::select(vec!["txt", "cif.bak", "xyz", "json"]),
    )
        .prop_map(
            |(eligible, other, cif_ext, other_ext): (HashSet<String>, HashSet<String>, &str, &str)| {
                let eligible = eligible
                    .into_iter()
                    .map(|stem| format!("{stem}.{cif_ext}"))
                    .collect();
                let other = other
                    .into_iter()
                    .map(|stem| format!("{stem}.{other_ext}"))
                    .collect();
                (eligible, other)
            },
        )
}
