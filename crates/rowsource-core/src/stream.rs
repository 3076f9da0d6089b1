//! Pull-based stream of materialized rows.
//!
//! Every row producer (driver, merge, expander) implements [`RowStream`] so
//! they compose freely and sit behind one [`DataSource`](crate::source::DataSource).

use crate::{
    error::InternalError, materialize::MaterializedRow, query::BaseQuery, session::Session,
};
use std::collections::VecDeque;

///
/// RowStream
///

pub trait RowStream {
    /// Produce the next row, or `None` once the stream is exhausted.
    /// Exhaustion is permanent.
    fn next_row(&mut self, session: &mut dyn Session)
    -> Result<Option<MaterializedRow>, InternalError>;

    /// Best-effort number of rows this stream will yield.
    fn estimate_row_count(&mut self, session: &mut dyn Session) -> Result<u64, InternalError>;

    /// Unpaged entity and criteria, if the stream has a single query shape.
    fn base_query(&self) -> Option<BaseQuery>;

    /// Short label used in progress messages ("Querying for ...").
    fn describe(&self) -> String;

    /// Per-row progress label; `None` uses the default row-count message.
    fn progress_label(&self, _row: &MaterializedRow) -> Option<String> {
        None
    }

    /// Release any open cursor. Idempotent.
    fn close(&mut self);
}

impl<T: RowStream + ?Sized> RowStream for Box<T> {
    fn next_row(
        &mut self,
        session: &mut dyn Session,
    ) -> Result<Option<MaterializedRow>, InternalError> {
        (**self).next_row(session)
    }

    fn estimate_row_count(&mut self, session: &mut dyn Session) -> Result<u64, InternalError> {
        (**self).estimate_row_count(session)
    }

    fn base_query(&self) -> Option<BaseQuery> {
        (**self).base_query()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn progress_label(&self, row: &MaterializedRow) -> Option<String> {
        (**self).progress_label(row)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

///
/// VecRowStream
///
/// Pre-built rows; used for composing already-materialized data.
///

#[derive(Clone, Debug, Default)]
pub struct VecRowStream {
    label: String,
    rows: VecDeque<MaterializedRow>,
}

impl VecRowStream {
    #[must_use]
    pub fn new(label: impl Into<String>, rows: Vec<MaterializedRow>) -> Self {
        Self {
            label: label.into(),
            rows: rows.into(),
        }
    }
}

impl RowStream for VecRowStream {
    fn next_row(&mut self, _: &mut dyn Session) -> Result<Option<MaterializedRow>, InternalError> {
        Ok(self.rows.pop_front())
    }

    fn estimate_row_count(&mut self, _: &mut dyn Session) -> Result<u64, InternalError> {
        Ok(self.rows.len() as u64)
    }

    fn base_query(&self) -> Option<BaseQuery> {
        None
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}
