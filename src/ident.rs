//! Local identifiers that are not remote names.
//!
//! A tracking plan / source connection has no name of its own, so it is
//! identified by the two natural keys joined with `|`.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Delimiter between the components of a composite id.
pub const DELIMITER: char = '|';

/// Join two natural keys into a composite id.
pub fn join(first: &str, second: &str) -> String {
    format!("{first}{DELIMITER}{second}")
}

/// Split a composite id on the first delimiter, keeping the remainder intact.
pub fn split(id: &str) -> Option<(&str, &str)> {
    id.split_once(DELIMITER)
}

/// `{tracking_plan_id}|{source_slug}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    pub tracking_plan_id: String,
    pub source_slug: String,
}

impl ConnectionId {
    pub const EXPECTED: &'static str = "{tracking_plan_id}|{source_slug}";

    pub fn new(tracking_plan_id: impl Into<String>, source_slug: impl Into<String>) -> Self {
        Self {
            tracking_plan_id: tracking_plan_id.into(),
            source_slug: source_slug.into(),
        }
    }
}

impl FromStr for ConnectionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split(s) {
            Some((plan, source)) if !plan.is_empty() && !source.is_empty() => {
                Ok(Self::new(plan, source))
            }
            _ => Err(Error::ImportId {
                kind: "segment_tracking_plan_source_connection",
                id: s.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.tracking_plan_id, &self.source_slug))
    }
}
