use crate::{record::Record, value::IdentityToken};
use std::collections::BTreeSet;

///
/// RelationDiff
///
/// Token partitions of an old and a new relation set. Both lists are in
/// first-seen order of their input sequence and hold no duplicates.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RelationDiff {
    pub added: Vec<IdentityToken>,
    pub removed: Vec<IdentityToken>,
}

impl RelationDiff {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff two token sequences: `added = new \ old`, `removed = old \ new`.
#[must_use]
pub fn diff_tokens(
    old: impl IntoIterator<Item = IdentityToken>,
    new: impl IntoIterator<Item = IdentityToken>,
) -> RelationDiff {
    let old = dedup(old);
    let new = dedup(new);
    let old_set = old.iter().collect::<BTreeSet<_>>();
    let new_set = new.iter().collect::<BTreeSet<_>>();

    let added = new
        .iter()
        .filter(|token| !old_set.contains(token))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|token| !new_set.contains(token))
        .cloned()
        .collect();

    RelationDiff { added, removed }
}

///
/// RecordDiff
///
/// Index form of a relation diff: `added` indexes into the new slice,
/// `removed` into the old one.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordDiff {
    pub added: Vec<usize>,
    pub removed: Vec<usize>,
}

/// Diff two record slices by identity token.
///
/// New records have no token and never match anything, so they are always
/// additions. Old records without a token were never stored and cannot be
/// removed. Duplicate tokens resolve to their first occurrence.
#[must_use]
pub fn diff_records(old: &[Record], new: &[Record]) -> RecordDiff {
    let old_tokens = old.iter().map(Record::identity_token).collect::<Vec<_>>();
    let new_tokens = new.iter().map(Record::identity_token).collect::<Vec<_>>();
    let token_diff = diff_tokens(
        old_tokens.iter().flatten().cloned(),
        new_tokens.iter().flatten().cloned(),
    );

    let added_set = token_diff.added.iter().collect::<BTreeSet<_>>();
    let removed_set = token_diff.removed.iter().collect::<BTreeSet<_>>();

    let mut seen = BTreeSet::new();
    let added = new_tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| match token {
            None => true,
            Some(token) => added_set.contains(token) && seen.insert(token.clone()),
        })
        .map(|(i, _)| i)
        .collect();

    let mut seen = BTreeSet::new();
    let removed = old_tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| {
            token
                .as_ref()
                .is_some_and(|token| removed_set.contains(token) && seen.insert(token.clone()))
        })
        .map(|(i, _)| i)
        .collect();

    RecordDiff { added, removed }
}

// Stable dedup: keep the first occurrence of each token.
fn dedup(tokens: impl IntoIterator<Item = IdentityToken>) -> Vec<IdentityToken> {
    let mut seen = BTreeSet::new();

    tokens
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

///
/// TESTS
///
