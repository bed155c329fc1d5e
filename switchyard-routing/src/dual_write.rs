//! Dual-write enforcement on the span write path.
//!
//! Write entry points route on residence, not version: which tables
//! physically hold rows decides where the next write lands. During the
//! dual-write window both writes must succeed or the operation fails;
//! a partial commit is never reported as success. Retries are safe
//! because span upserts are idempotent by `(project_id, call_id)`.

use std::sync::Arc;

use switchyard_core::{
    ProjectDataResidence, ResolutionMode, RoutingError, StoreError, SwitchyardResult,
    CALLS_COMPLETE_TABLE, CALLS_MERGED_TABLE,
};

use crate::store::{AnalyticalStore, SpanRecord};

/// Where a span write originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSource {
    /// The call-lifecycle recording API.
    Recorder,
    /// The external wire-protocol ingestion path. Permanently carved out
    /// to the legacy table only: that path cannot cheaply guarantee
    /// downstream consistency for the complete schema.
    WireIngest,
}

/// The table targets chosen for one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePlan {
    MergedOnly,
    CompleteOnly,
    Both,
}

impl WritePlan {
    /// Target tables, legacy side first.
    pub fn tables(self) -> &'static [&'static str] {
        match self {
            Self::MergedOnly => &[CALLS_MERGED_TABLE],
            Self::CompleteOnly => &[CALLS_COMPLETE_TABLE],
            Self::Both => &[CALLS_MERGED_TABLE, CALLS_COMPLETE_TABLE],
        }
    }

    pub fn is_dual(self) -> bool {
        matches!(self, Self::Both)
    }
}

/// Decide the write targets for one span.
///
/// Wire-ingest spans always land in the legacy table, regardless of mode
/// or residence. Modes that do not follow residence pin writes to the
/// legacy table. Otherwise the residence rule applies: a project still on
/// one side keeps writing that side (`None` and `CompleteOnly` write the
/// complete table), and `Both` means the dual-write window is open.
pub fn plan_write(
    mode: ResolutionMode,
    residence: ProjectDataResidence,
    source: WriteSource,
) -> WritePlan {
    if source == WriteSource::WireIngest {
        return WritePlan::MergedOnly;
    }
    if !mode.writes_follow_residence() {
        return WritePlan::MergedOnly;
    }
    match residence {
        ProjectDataResidence::MergedOnly => WritePlan::MergedOnly,
        ProjectDataResidence::None | ProjectDataResidence::CompleteOnly => WritePlan::CompleteOnly,
        ProjectDataResidence::Both => WritePlan::Both,
    }
}

/// Span writer enforcing the dual-write contract.
pub struct SpanWriter<S: AnalyticalStore> {
    store: Arc<S>,
    mode: ResolutionMode,
}

impl<S: AnalyticalStore> SpanWriter<S> {
    pub fn new(store: Arc<S>, mode: ResolutionMode) -> Self {
        Self { store, mode }
    }

    /// Compute the project's current residence from row presence.
    pub async fn compute_residence(
        &self,
        project_id: &str,
    ) -> SwitchyardResult<ProjectDataResidence> {
        let presence = self.store.table_presence(project_id).await.map_err(|e| {
            RoutingError::GroundTruthUnavailable {
                project_id: project_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(ProjectDataResidence::from_presence(presence))
    }

    /// Write one span to the table(s) its project's residence requires.
    ///
    /// Returns the executed plan. A dual write that lands in only one
    /// table is an error, logged and propagated; the caller may retry the
    /// whole write because upserts are idempotent.
    pub async fn write_span(
        &self,
        span: &SpanRecord,
        source: WriteSource,
    ) -> SwitchyardResult<WritePlan> {
        // Wire ingest and legacy-pinned modes land in the merged table no
        // matter what residence says, so those paths skip the ground-truth
        // round trip entirely. Ingest in particular is the high-volume
        // path and must stay a single write.
        let plan = if source == WriteSource::WireIngest || !self.mode.writes_follow_residence() {
            WritePlan::MergedOnly
        } else {
            let residence = self.compute_residence(&span.project_id).await?;
            plan_write(self.mode, residence, source)
        };

        match plan {
            WritePlan::MergedOnly => {
                self.write_one(span, CALLS_MERGED_TABLE).await?;
            }
            WritePlan::CompleteOnly => {
                self.write_one(span, CALLS_COMPLETE_TABLE).await?;
            }
            WritePlan::Both => {
                self.write_both(span).await?;
            }
        }
        Ok(plan)
    }

    async fn write_one(&self, span: &SpanRecord, table: &str) -> SwitchyardResult<()> {
        self.store
            .upsert_span(table, span)
            .await
            .map_err(|e| write_failed(span, table, e))?;
        Ok(())
    }

    async fn write_both(&self, span: &SpanRecord) -> SwitchyardResult<()> {
        // Legacy side first: if it fails nothing has landed and the
        // error is an ordinary write failure, not a partial commit.
        self.store
            .upsert_span(CALLS_MERGED_TABLE, span)
            .await
            .map_err(|e| write_failed(span, CALLS_MERGED_TABLE, e))?;

        if let Err(e) = self.store.upsert_span(CALLS_COMPLETE_TABLE, span).await {
            let err = RoutingError::DualWritePartialFailure {
                project_id: span.project_id.clone(),
                call_id: span.call_id.clone(),
                written: CALLS_MERGED_TABLE.to_string(),
                failed: CALLS_COMPLETE_TABLE.to_string(),
                reason: e.to_string(),
            };
            tracing::error!(project_id = %span.project_id, call_id = %span.call_id, "{err}");
            return Err(err.into());
        }
        Ok(())
    }
}

fn write_failed(span: &SpanRecord, table: &str, e: StoreError) -> switchyard_core::SwitchyardError {
    let err = RoutingError::WriteFailed {
        project_id: span.project_id.clone(),
        table: table.to_string(),
        reason: e.to_string(),
    };
    tracing::error!(project_id = %span.project_id, call_id = %span.call_id, "{err}");
    err.into()
}
