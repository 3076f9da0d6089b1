//! Module: driver
//! Responsibility: lazy open, row-by-row materialization, decache cadence, and
//! the incremental (paged) cursor fallback for one report query.
//! Does not own: column binding (materialize) or multi-source ordering (merge).
//! Boundary: the session is borrowed per call; the driver only owns its cursor.

mod cursor;
mod definition;

#[cfg(test)]
mod tests;

use crate::{
    DEFAULT_INCREMENTAL_THRESHOLD, DEFAULT_PAGE_SIZE,
    error::InternalError,
    materialize::MaterializedRow,
    obs::{CursorMode, ReportTraceSink, TraceScope},
    query::{BaseQuery, Predicate, Window},
    session::Session,
    stream::RowStream,
};
use cursor::{IncrementalCursor, RowCursor};
use std::{fmt, sync::Arc};
use tracing::debug;

// re-exports
pub use definition::{ProgressLabel, ReportDefinition};

///
/// DecachePolicy
///
/// When the driver clears the session's object cache.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DecachePolicy {
    /// After every materialized row.
    #[default]
    EveryRow,
    /// After every `n` materialized rows.
    Every(u64),
    /// Never; an enclosing stream owns the cadence.
    Never,
}

impl DecachePolicy {
    #[must_use]
    pub const fn is_due(self, rows: u64) -> bool {
        match self {
            Self::EveryRow => true,
            Self::Every(0) | Self::Never => false,
            Self::Every(interval) => rows % interval == 0,
        }
    }
}

///
/// DriverOptions
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DriverOptions {
    /// Estimates strictly above this switch to the incremental cursor.
    pub incremental_threshold: u64,
    pub page_size: u64,
    pub decache: DecachePolicy,
    pub window: Window,
}

impl DriverOptions {
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u64) -> Self {
        self.incremental_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn with_decache(mut self, decache: DecachePolicy) -> Self {
        self.decache = decache;
        self
    }

    #[must_use]
    pub const fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            incremental_threshold: DEFAULT_INCREMENTAL_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            decache: DecachePolicy::EveryRow,
            window: Window::all(),
        }
    }
}

///
/// DriverPhase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriverPhase {
    Unopened,
    Open,
    Exhausted,
}

enum DriverState {
    Unopened,
    Open(RowCursor),
    Exhausted,
}

///
/// StreamingDriver
///
/// Single-query report stream.
///
/// Unopened → Open on the first `next_row`; Open → Exhausted when the cursor
/// runs dry, on any fault, or on `close`. Exhausted is terminal.
///

pub struct StreamingDriver {
    definition: Arc<ReportDefinition>,
    options: DriverOptions,
    state: DriverState,
    rows: u64,
    estimate: Option<u64>,
    row_filter: Option<Predicate>,
    trace: TraceScope,
}

impl StreamingDriver {
    #[must_use]
    pub fn new(definition: Arc<ReportDefinition>, options: DriverOptions) -> Self {
        let trace = TraceScope::new(None, definition.fingerprint());

        Self {
            definition,
            options,
            state: DriverState::Unopened,
            rows: 0,
            estimate: None,
            row_filter: None,
            trace,
        }
    }

    /// Skip materialized rows that do not match `filter`.
    #[must_use]
    pub fn with_row_filter(mut self, filter: Predicate) -> Self {
        self.row_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_trace_sink(mut self, sink: Arc<dyn ReportTraceSink>) -> Self {
        self.trace.set_sink(sink);
        self
    }

    #[must_use]
    pub const fn definition(&self) -> &Arc<ReportDefinition> {
        &self.definition
    }

    #[must_use]
    pub const fn options(&self) -> &DriverOptions {
        &self.options
    }

    #[must_use]
    pub const fn phase(&self) -> DriverPhase {
        match self.state {
            DriverState::Unopened => DriverPhase::Unopened,
            DriverState::Open(_) => DriverPhase::Open,
            DriverState::Exhausted => DriverPhase::Exhausted,
        }
    }

    /// Rows materialized so far, including rows the row filter skipped.
    #[must_use]
    pub const fn rows_read(&self) -> u64 {
        self.rows
    }

    fn open(&mut self, session: &mut dyn Session) -> Result<(), InternalError> {
        let estimate = self.estimate_row_count(session)?;
        let query = self.definition.projection(self.options.window);

        let (cursor, mode) = if estimate > self.options.incremental_threshold {
            let page_size = self.options.page_size.max(1);
            (
                RowCursor::Incremental(IncrementalCursor::new(
                    query,
                    page_size,
                    self.trace.clone(),
                )),
                CursorMode::Incremental { page_size },
            )
        } else {
            (RowCursor::Single(session.open(&query)?), CursorMode::Single)
        };

        debug!(
            report = %self.definition.name(),
            fingerprint = %self.trace.fingerprint(),
            estimate,
            ?mode,
            "report query opened"
        );
        self.trace.open(mode, estimate);
        self.state = DriverState::Open(cursor);

        Ok(())
    }

    // Release the cursor and surface the fault.
    fn fail(&mut self, err: InternalError) -> InternalError {
        self.state = DriverState::Exhausted;
        debug!(
            report = %self.definition.name(),
            rows = self.rows,
            error = %err.display_with_class(),
            "report stream failed"
        );
        self.trace.error(&err);

        err
    }

    fn finish(&mut self) {
        self.state = DriverState::Exhausted;
        debug!(report = %self.definition.name(), rows = self.rows, "report stream exhausted");
        self.trace.finish(self.rows);
    }

    fn decache_if_due(&mut self, session: &mut dyn Session) -> Result<(), InternalError> {
        if self.options.decache.is_due(self.rows) {
            session.decache()?;
            self.trace.decache(self.rows);
        }

        Ok(())
    }
}

impl RowStream for StreamingDriver {
    fn next_row(
        &mut self,
        session: &mut dyn Session,
    ) -> Result<Option<MaterializedRow>, InternalError> {
        if matches!(self.state, DriverState::Unopened) {
            self.open(session).map_err(|err| self.fail(err))?;
        }

        loop {
            let DriverState::Open(cursor) = &mut self.state else {
                return Ok(None);
            };

            let raw = match cursor.next_raw(session) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.finish();
                    return Ok(None);
                }
                Err(err) => return Err(self.fail(err)),
            };

            let row = self
                .definition
                .materializer()
                .materialize(&raw, session)
                .map_err(|err| self.fail(err))?;
            self.rows += 1;
            self.decache_if_due(session).map_err(|err| self.fail(err))?;

            if self
                .row_filter
                .as_ref()
                .is_none_or(|filter| filter.evaluate(&row))
            {
                return Ok(Some(row));
            }
        }
    }

    /// Count matching rows once, clamped to the driver window.
    fn estimate_row_count(&mut self, session: &mut dyn Session) -> Result<u64, InternalError> {
        if let Some(estimate) = self.estimate {
            return Ok(estimate);
        }

        let total = session.count(self.definition.query())?;
        let estimate = self.options.window.clamp_count(total);
        self.estimate = Some(estimate);

        Ok(estimate)
    }

    fn base_query(&self) -> Option<BaseQuery> {
        Some(self.definition.query().base_query())
    }

    fn describe(&self) -> String {
        self.definition.query().entity.clone()
    }

    fn progress_label(&self, row: &MaterializedRow) -> Option<String> {
        self.definition.progress_label(row)
    }

    fn close(&mut self) {
        if !matches!(self.state, DriverState::Exhausted) {
            debug!(report = %self.definition.name(), rows = self.rows, "report stream closed");
        }
        self.state = DriverState::Exhausted;
    }
}

impl fmt::Debug for StreamingDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingDriver")
            .field("report", &self.definition.name())
            .field("phase", &self.phase())
            .field("rows", &self.rows)
            .field("estimate", &self.estimate)
            .finish_non_exhaustive()
    }
}
