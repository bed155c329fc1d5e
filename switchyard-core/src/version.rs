//! Project schema version and data residence facts.

use serde::{Deserialize, Serialize};

use crate::{CALLS_COMPLETE_TABLE, CALLS_MERGED_TABLE};

/// Which physical schema a project's rows live under.
///
/// Once a project has rows, its version is a stable, recomputable fact:
/// ground truth can always re-derive it from row presence. `Empty` is the
/// one undecided state, and it must never be cached anywhere - the next
/// write could still resolve the project either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectVersion {
    /// No rows in either table yet.
    Empty,
    /// Rows live in the legacy `calls_merged` table.
    Legacy,
    /// Rows live in the current `calls_complete` table.
    Current,
}

impl ProjectVersion {
    /// Raw integer representation, as stored in the shared cache and
    /// surfaced to operators.
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Empty => -1,
            Self::Legacy => 0,
            Self::Current => 1,
        }
    }

    /// Interpret a raw shared-cache value.
    ///
    /// Values outside {0, 1} are a reserved forward-compatibility space
    /// that no current mode produces; they map to `Legacy`, the
    /// conservative side. `-1` (empty) is never written to the shared
    /// cache, so it is treated the same way.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => Self::Current,
            _ => Self::Legacy,
        }
    }

    /// Whether this version may be cached.
    ///
    /// `Legacy` and `Current` are stable facts once observed; `Empty` is
    /// undecided and caching it could wrongly pin a project.
    pub fn is_cacheable(self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// The table reads should target for this version.
    ///
    /// `Empty` reads the current table: a project with no rows yet will
    /// receive its first non-ingestion write there.
    pub fn read_table(self) -> &'static str {
        match self {
            Self::Legacy => CALLS_MERGED_TABLE,
            Self::Empty | Self::Current => CALLS_COMPLETE_TABLE,
        }
    }
}

/// Result of a single round-trip row-presence check against both tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TablePresence {
    /// Any row for the project in `calls_merged`.
    pub in_merged: bool,
    /// Any row for the project in `calls_complete`.
    pub in_complete: bool,
}

/// Which physical tables currently hold rows for a project.
///
/// A derived fact, distinct from [`ProjectVersion`]: residence drives
/// write targets once a project has entered the dual-write phase.
/// Transitions are monotonic - `None` to one side to `Both` - and never
/// regress, because the store is append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectDataResidence {
    /// No rows anywhere.
    None,
    /// Rows only in the legacy table.
    MergedOnly,
    /// Rows only in the current table.
    CompleteOnly,
    /// Rows in both tables (dual-write window).
    Both,
}

impl ProjectDataResidence {
    /// Derive residence from a physical presence check.
    pub fn from_presence(presence: TablePresence) -> Self {
        match (presence.in_merged, presence.in_complete) {
            (false, false) => Self::None,
            (true, false) => Self::MergedOnly,
            (false, true) => Self::CompleteOnly,
            (true, true) => Self::Both,
        }
    }
}

impl TablePresence {
    /// Resolve a version from presence.
    ///
    /// `Current` wins whenever the complete table has any row, regardless
    /// of the merged table: dual-write guarantees the complete table is a
    /// superset once migration begins.
    pub fn version(self) -> ProjectVersion {
        match (self.in_merged, self.in_complete) {
            (_, true) => ProjectVersion::Current,
            (true, false) => ProjectVersion::Legacy,
            (false, false) => ProjectVersion::Empty,
        }
    }
}
