//! Cheap serialized-size estimates used to bound page files.
//!
//! The numbers are per-field overheads for YAML keys, indentation and list
//! markers. They only need to be conservative, not exact.

use crate::types::{Enrollment, Identity, Profile};

pub const ENROLLMENT_OVERHEAD: usize = 48;
pub const IDENTITY_OVERHEAD: usize = 8;
pub const IDENTITY_FIELD_OVERHEAD: usize = 8;
pub const PROFILE_OVERHEAD: usize = 12;
pub const PROFILE_FIELD_OVERHEAD: usize = 6;
pub const BOT_FLAG_OVERHEAD: usize = 7;

pub trait EstimatedSize {
    /// Estimated serialized byte cost.
    fn estimated_size(&self) -> usize;
}

impl EstimatedSize for Enrollment {
    fn estimated_size(&self) -> usize {
        ENROLLMENT_OVERHEAD + self.organization.len()
    }
}

impl EstimatedSize for Identity {
    fn estimated_size(&self) -> usize {
        IDENTITY_OVERHEAD
            + self.source.len()
            + optional_cost(IDENTITY_FIELD_OVERHEAD, [&self.name, &self.email, &self.username])
    }
}

impl EstimatedSize for Profile {
    fn estimated_size(&self) -> usize {
        let scalars = optional_cost(
            PROFILE_FIELD_OVERHEAD,
            [&self.country_code, &self.gender, &self.email, &self.name],
        );
        let bot = if self.is_bot.is_some() {
            BOT_FLAG_OVERHEAD
        } else {
            0
        };
        let identities: usize = self.identities.iter().map(EstimatedSize::estimated_size).sum();
        let enrollments: usize = self.enrollments.iter().map(EstimatedSize::estimated_size).sum();
        PROFILE_OVERHEAD + scalars + bot + identities + enrollments
    }
}

fn optional_cost<const N: usize>(overhead: usize, fields: [&Option<String>; N]) -> usize {
    fields
        .into_iter()
        .flatten()
        .map(|value| overhead + value.len())
        .sum()
}
