//! Parent-to-children row fan-out.
//!
//! Each parent row expands into zero or more child rows; parents with no
//! children contribute nothing. The session is decached after every parent.


use crate::{
    error::InternalError, materialize::MaterializedRow, query::BaseQuery, session::Session,
    stream::RowStream,
};
use std::collections::VecDeque;
use tracing::debug;

///
/// RowExpander
///

pub trait RowExpander {
    fn expand(
        &self,
        parent: &MaterializedRow,
        session: &mut dyn Session,
    ) -> Result<Vec<MaterializedRow>, InternalError>;
}

impl<F> RowExpander for F
where
    F: Fn(&MaterializedRow, &mut dyn Session) -> Result<Vec<MaterializedRow>, InternalError>,
{
    fn expand(
        &self,
        parent: &MaterializedRow,
        session: &mut dyn Session,
    ) -> Result<Vec<MaterializedRow>, InternalError> {
        self(parent, session)
    }
}

///
/// ExpandingStream
///

pub struct ExpandingStream<S, E> {
    parent: S,
    expander: E,
    pending: VecDeque<MaterializedRow>,
    parents: u64,
    exhausted: bool,
}

impl<S: RowStream, E: RowExpander> ExpandingStream<S, E> {
    pub fn new(parent: S, expander: E) -> Self {
        Self {
            parent,
            expander,
            pending: VecDeque::new(),
            parents: 0,
            exhausted: false,
        }
    }

    /// Parent rows consumed so far.
    #[must_use]
    pub const fn parents_read(&self) -> u64 {
        self.parents
    }

    fn pull(&mut self, session: &mut dyn Session) -> Result<Option<MaterializedRow>, InternalError> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }

            let Some(parent) = self.parent.next_row(session)? else {
                debug!(parents = self.parents, "expanding stream exhausted");
                self.exhausted = true;
                return Ok(None);
            };

            let children = self.expander.expand(&parent, session)?;
            self.parents += 1;
            session.decache()?;
            self.pending.extend(children);
        }
    }
}

impl<S: RowStream, E: RowExpander> RowStream for ExpandingStream<S, E> {
    fn next_row(
        &mut self,
        session: &mut dyn Session,
    ) -> Result<Option<MaterializedRow>, InternalError> {
        if self.exhausted {
            return Ok(None);
        }

        self.pull(session).inspect_err(|_| self.close())
    }

    /// Parent estimate; the fan-out is unknown until rows are expanded.
    fn estimate_row_count(&mut self, session: &mut dyn Session) -> Result<u64, InternalError> {
        self.parent.estimate_row_count(session)
    }

    fn base_query(&self) -> Option<BaseQuery> {
        self.parent.base_query()
    }

    fn describe(&self) -> String {
        self.parent.describe()
    }

    fn progress_label(&self, row: &MaterializedRow) -> Option<String> {
        self.parent.progress_label(row)
    }

    fn close(&mut self) {
        self.parent.close();
        self.pending.clear();
        self.exhausted = true;
    }
}
