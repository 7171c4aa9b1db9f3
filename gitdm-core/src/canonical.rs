//! Canonical keys and canonical ordering.
//!
//! A canonical key is a plain `:`-joined concatenation of field values. It is
//! both the sort key for page output and the identity of a profile when two
//! collections are diffed.
//!
//! Values are not escaped, so a value containing `:` can collide with a
//! different split of fields. Absent optional fields and explicit empty
//! strings contribute the same (nothing) after their separator.

use crate::types::{Enrollment, Identity, Profile};

/// Deterministic string key derived from every field value.
pub trait CanonicalKey {
    fn canonical_key(&self) -> String;
}

impl CanonicalKey for Enrollment {
    /// `start:end:organization`
    fn canonical_key(&self) -> String {
        format!("{}:{}:{}", self.start, self.end, self.organization)
    }
}

impl CanonicalKey for Identity {
    /// `source:name:email:username`
    fn canonical_key(&self) -> String {
        let mut key = self.source.clone();
        for field in [&self.name, &self.email, &self.username] {
            push_field(&mut key, field.as_deref());
        }
        key
    }
}

impl CanonicalKey for Profile {
    /// `name:email:country:gender:bot` followed by `:<identity>` for every
    /// identity key and `:<enrollment>` for every enrollment key, each group
    /// in ascending order.
    ///
    /// Sub-keys are sorted here, so the key does not depend on the order of
    /// `identities` or `enrollments`.
    fn canonical_key(&self) -> String {
        let mut key = self.name.clone().unwrap_or_default();
        push_field(&mut key, self.email.as_deref());
        push_field(&mut key, self.country_code.as_deref());
        push_field(&mut key, self.gender.as_deref());
        key.push_str(match self.is_bot {
            Some(false) => ":0",
            Some(true) => ":1",
            None => ":",
        });

        for sub in sorted_keys(&self.identities)
            .into_iter()
            .chain(sorted_keys(&self.enrollments))
        {
            key.push(':');
            key.push_str(&sub);
        }
        key
    }
}

fn push_field(key: &mut String, value: Option<&str>) {
    key.push(':');
    if let Some(value) = value {
        key.push_str(value);
    }
}

fn sorted_keys<T: CanonicalKey>(items: &[T]) -> Vec<String> {
    let mut keys: Vec<String> = items.iter().map(CanonicalKey::canonical_key).collect();
    keys.sort();
    keys
}

impl Profile {
    /// Sort this profile's identities and enrollments by their canonical keys.
    pub fn canonicalize(&mut self) {
        self.identities
            .sort_by_cached_key(CanonicalKey::canonical_key);
        self.enrollments
            .sort_by_cached_key(CanonicalKey::canonical_key);
    }
}

/// Put a collection into canonical order: every profile's sub-lists sorted,
/// then the profiles themselves sorted by canonical key.
///
/// All sorts are stable, so profiles with equal keys keep their input order.
pub fn canonicalize_all(profiles: &mut [Profile]) {
    for profile in profiles.iter_mut() {
        profile.canonicalize();
    }
    profiles.sort_by_cached_key(CanonicalKey::canonical_key);
}
