//! Strongly-typed identifiers used across the library.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a comic in the library.
///
/// Comic ids are database-assigned integers; they travel through job parameters as
/// their decimal string form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComicId(i64);

impl ComicId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for ComicId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for ComicId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<ComicId> for i64 {
    fn from(value: ComicId) -> Self {
        value.0
    }
}

impl FromStr for ComicId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|e| DomainError::invalid_id(format!("ComicId: {e}")))?;
        Ok(Self(value))
    }
}
