//! Set difference between two profile collections keyed by canonical key.
//!
//! A profile whose content changed shows up as one removal (old key) plus one
//! addition (new key); there is no in-place update. Profiles sharing a key on
//! the same side collapse to the last one seen.

use std::collections::BTreeMap;

use gitdm_core::{BulkUpdate, CanonicalKey, Profile};

/// Additions and removals needed to turn `current` into `candidate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDiff {
    /// Candidate profiles whose key is absent from current, in key order.
    pub additions: Vec<Profile>,
    /// Current profiles whose key is absent from candidate, in key order.
    pub removals: Vec<Profile>,
}

impl ProfileDiff {
    /// Compare `candidate` (the desired state) against `current`.
    pub fn compute(candidate: &[Profile], current: &[Profile]) -> Self {
        let candidate = key_map(candidate);
        let current = key_map(current);

        let additions: Vec<Profile> = candidate
            .iter()
            .filter(|(key, _)| !current.contains_key(*key))
            .map(|(_, p)| (*p).clone())
            .collect();
        let removals: Vec<Profile> = current
            .iter()
            .filter(|(key, _)| !candidate.contains_key(*key))
            .map(|(_, p)| (*p).clone())
            .collect();

        tracing::debug!(
            "diff: {} candidate key(s), {} current key(s), {} addition(s), {} removal(s)",
            candidate.len(),
            current.len(),
            additions.len(),
            removals.len()
        );
        ProfileDiff { additions, removals }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Number of profiles the batch would carry.
    pub fn len(&self) -> usize {
        self.additions.len() + self.removals.len()
    }

    pub fn into_update(self) -> BulkUpdate {
        BulkUpdate {
            additions: self.additions,
            removals: self.removals,
        }
    }
}

fn key_map(profiles: &[Profile]) -> BTreeMap<String, &Profile> {
    let mut map = BTreeMap::new();
    for profile in profiles {
        if let Some(previous) = map.insert(profile.canonical_key(), profile) {
            tracing::debug!("duplicate profile key, keeping last: {:?}", previous.name);
        }
    }
    map
}
