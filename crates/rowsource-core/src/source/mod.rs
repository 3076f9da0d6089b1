//! Module: source
//! Responsibility: the engine-facing data source surface (advance, field
//! access, estimate, base query, close, progress) over any row stream.
//! Does not own: row production; the wrapped stream does.


use crate::{
    DEFAULT_PROGRESS_INTERVAL,
    error::{FieldError, InternalError},
    materialize::MaterializedRow,
    query::BaseQuery,
    session::Session,
    stream::RowStream,
    value::Value,
};
use std::{fmt, sync::Arc};

///
/// ProgressSink
///
/// Observer for human-readable progress. `percent` is `None` when the total
/// is unknown. Purely observational.
///

pub trait ProgressSink {
    fn on_progress(&self, message: &str, percent: Option<u8>);
}

///
/// DataSource
///
/// Pull-based adapter a reporting engine drives with `advance` then `field`.
///

pub struct DataSource<S: RowStream> {
    stream: S,
    current: Option<MaterializedRow>,
    opened: bool,
    exhausted: bool,
    rows: u64,
    estimate: Option<u64>,
    progress: Option<Arc<dyn ProgressSink>>,
    progress_every: u64,
}

impl<S: RowStream> DataSource<S> {
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            current: None,
            opened: false,
            exhausted: false,
            rows: 0,
            estimate: None,
            progress: None,
            progress_every: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Emit a progress update every `rows` rows (at least one).
    #[must_use]
    pub fn with_progress_every(mut self, rows: u64) -> Self {
        self.progress_every = rows.max(1);
        self
    }

    pub fn set_progress_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.progress = Some(sink);
    }

    /// Move to the next row. `false` means permanently exhausted.
    pub fn advance(&mut self, session: &mut dyn Session) -> Result<bool, InternalError> {
        if self.exhausted {
            return Ok(false);
        }
        if !self.opened {
            self.opened = true;
            let message = format!("Querying for {}", self.stream.describe());
            self.report(&message, None);
        }

        match self.stream.next_row(session) {
            Ok(Some(row)) => {
                self.rows += 1;
                if self.rows % self.progress_every == 0 {
                    self.report_row_progress(&row, session);
                }
                self.current = Some(row);
                Ok(true)
            }
            Ok(None) => {
                self.exhausted = true;
                self.current = None;
                Ok(false)
            }
            Err(err) => {
                self.exhausted = true;
                self.current = None;
                Err(err)
            }
        }
    }

    /// Value of `name` in the current row. Repeatable and side-effect free.
    pub fn field(&self, name: &str) -> Result<&Value, FieldError> {
        self.current
            .as_ref()
            .ok_or(FieldError::NoCurrentRow)?
            .get(name)
    }

    #[must_use]
    pub const fn current_row(&self) -> Option<&MaterializedRow> {
        self.current.as_ref()
    }

    /// Count of rows the source expects to yield; computed once.
    pub fn estimate_row_count(&mut self, session: &mut dyn Session) -> Result<u64, InternalError> {
        if let Some(estimate) = self.estimate {
            return Ok(estimate);
        }
        let estimate = self.stream.estimate_row_count(session)?;
        self.estimate = Some(estimate);

        Ok(estimate)
    }

    #[must_use]
    pub fn base_query(&self) -> Option<BaseQuery> {
        self.stream.base_query()
    }

    /// Release the stream. Safe before the first advance and when repeated.
    pub fn close(&mut self) {
        self.stream.close();
        self.exhausted = true;
        self.current = None;
    }

    #[must_use]
    pub const fn rows_read(&self) -> u64 {
        self.rows
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    #[must_use]
    pub const fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    fn report(&self, message: &str, percent: Option<u8>) {
        if let Some(sink) = &self.progress {
            sink.on_progress(message, percent);
        }
    }

    fn report_row_progress(&mut self, row: &MaterializedRow, session: &mut dyn Session) {
        if self.progress.is_none() {
            return;
        }

        // progress never fails iteration
        let total = self.estimate_row_count(session).ok().filter(|total| *total > 0);
        let percent = total.map(|total| {
            let percent = (self.rows.saturating_mul(100) / total).min(100);
            u8::try_from(percent).unwrap_or(100)
        });
        let message = self.stream.progress_label(row).unwrap_or_else(|| match total {
            Some(total) => format!("Processed {} of {total}", self.rows),
            None => format!("Processed {}", self.rows),
        });

        self.report(&message, percent);
    }
}

impl<S: RowStream> fmt::Debug for DataSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("stream", &self.stream.describe())
            .field("opened", &self.opened)
            .field("exhausted", &self.exhausted)
            .field("rows", &self.rows)
            .field("estimate", &self.estimate)
            .finish_non_exhaustive()
    }
}
