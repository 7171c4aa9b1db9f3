//! Domain types for contributor affiliation profiles.
//!
//! Field tags are the short single-letter codes used in page files and in
//! affiliation service payloads. Absent optional fields and empty lists are
//! omitted from serialized output; `Some("")` is kept as an explicit empty
//! string.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// A time-bounded affiliation of a contributor with an organization.
///
/// `start` and `end` are opaque date strings, compared lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(rename = "T", default)]
    pub end: String,
    #[serde(rename = "C")]
    pub organization: String,
    #[serde(rename = "F", default)]
    pub start: String,
}

impl Enrollment {
    pub fn new(
        organization: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            end: end.into(),
            organization: organization.into(),
            start: start.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// One source-system account associated with a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "M", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "S")]
    pub source: String,
    #[serde(rename = "U", default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Identity {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A contributor affiliation record.
///
/// There is no separate primary key: two profiles are the same record iff
/// their canonical keys match (see [`crate::canonical`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "R", default, skip_serializing_if = "Vec::is_empty")]
    pub enrollments: Vec<Enrollment>,
    #[serde(rename = "S", default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "I", default, skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<Identity>,
    #[serde(
        rename = "B",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bot_flag"
    )]
    pub is_bot: Option<bool>,
    #[serde(rename = "U", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Profile {
    /// A profile carrying only a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// The bot flag travels as an integer (`0` / `1`); any non-zero value is a bot.
mod bot_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawFlag {
        Int(i64),
        Bool(bool),
    }

    pub fn serialize<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(flag) => serializer.serialize_i64(i64::from(*flag)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        let raw = Option::<RawFlag>::deserialize(deserializer)?;
        Ok(raw.map(|flag| match flag {
            RawFlag::Int(n) => n != 0,
            RawFlag::Bool(b) => b,
        }))
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// One page file (`profiles<N>.yaml`) or a fetch-all service response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfilePage {
    #[serde(rename = "P", default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<Profile>,
}

/// Borrowed form of [`ProfilePage`] used when rendering a slice of a larger
/// sorted collection.
#[derive(Debug, Serialize)]
pub struct PageView<'a> {
    #[serde(rename = "P")]
    pub profiles: &'a [Profile],
}

/// Additions/removals batch submitted to the affiliation service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BulkUpdate {
    #[serde(rename = "A", default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<Profile>,
    #[serde(rename = "R", default, skip_serializing_if = "Vec::is_empty")]
    pub removals: Vec<Profile>,
}

impl BulkUpdate {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Short status text returned by the bulk-update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusText {
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted() {
        let yaml = serde_yaml::to_string(&Profile::named("Ann")).unwrap();
        assert_eq!(yaml, "U: Ann\n");
    }

    #[test]
    fn explicit_empty_string_survives_roundtrip() {
        let profile = Profile {
            email: Some(String::new()),
            ..Profile::named("Ann")
        };
        let yaml = serde_yaml::to_string(&profile).unwrap();
        let back: Profile = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.email, Some(String::new()));
    }

    #[test]
    fn bot_flag_is_integer_on_the_wire() {
        let bot = Profile {
            is_bot: Some(true),
            ..Profile::default()
        };
        assert_eq!(serde_yaml::to_string(&bot).unwrap(), "B: 1\n");

        let human: Profile = serde_yaml::from_str("B: 0\n").unwrap();
        assert_eq!(human.is_bot, Some(false));

        let other: Profile = serde_yaml::from_str("B: 7\n").unwrap();
        assert_eq!(other.is_bot, Some(true), "non-zero decodes as bot");

        let absent: Profile = serde_yaml::from_str("U: x\n").unwrap();
        assert_eq!(absent.is_bot, None);
    }

    #[test]
    fn decodes_short_tags() {
        let yaml = "\
P:
- C: pl
  E: ann@example.com
  R:
  - T: '2100-01-01'
    C: Acme
    F: '1900-01-01'
  S: f
  I:
  - E: ann@example.com
    S: git
    U: ann
  U: Ann
";
        let page: ProfilePage = serde_yaml::from_str(yaml).unwrap();
        let profile = &page.profiles[0];
        assert_eq!(profile.country_code.as_deref(), Some("pl"));
        assert_eq!(profile.gender.as_deref(), Some("f"));
        assert_eq!(profile.enrollments[0].organization, "Acme");
        assert_eq!(profile.enrollments[0].start, "1900-01-01");
        assert_eq!(profile.identities[0].username.as_deref(), Some("ann"));
        assert_eq!(profile.identities[0].name, None);
    }

    #[test]
    fn empty_bulk_update_serializes_to_empty_mapping() {
        let update = BulkUpdate::default();
        assert!(update.is_empty());
        assert_eq!(serde_yaml::to_string(&update).unwrap(), "{}\n");
    }
}
