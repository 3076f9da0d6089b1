//! Module: session
//! Responsibility: the persistence boundary the core issues read-only queries
//! and cache clears against.
//! Does not own: query execution semantics; implementations do.
//! Boundary: every core call that touches persistence receives `&mut dyn Session`.

mod memory;


use crate::{
    error::InternalError,
    materialize::RawRow,
    query::{QuerySpec, Window},
};
use std::collections::VecDeque;

// re-exports
pub use memory::{MemorySession, SessionStats};

///
/// ProjectionQuery
///
/// Query shape plus the projected column list and paging window.
/// The window never leaks into [`QuerySpec`]; base queries stay unpaged.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionQuery {
    pub spec: QuerySpec,
    pub columns: Vec<String>,
    pub window: Window,
}

impl ProjectionQuery {
    #[must_use]
    pub fn new(spec: QuerySpec, columns: Vec<String>) -> Self {
        Self {
            spec,
            columns,
            window: Window::all(),
        }
    }

    #[must_use]
    pub const fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }
}

///
/// RawRowStream
///
/// Owned cursor over one projection result.
/// A stream never borrows its session; dropping it releases the cursor.
///

pub trait RawRowStream {
    fn next_raw(&mut self) -> Result<Option<RawRow>, InternalError>;
}

///
/// VecRawRowStream
///
/// Buffered projection result, optionally failing after a fixed number of rows.
///

#[derive(Debug, Default)]
pub struct VecRawRowStream {
    rows: VecDeque<RawRow>,
    fail_after: Option<usize>,
    yielded: usize,
}

impl VecRawRowStream {
    #[must_use]
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: rows.into(),
            fail_after: None,
            yielded: 0,
        }
    }

    /// Yield `rows` successful rows, then fail every following fetch.
    #[must_use]
    pub const fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }
}

impl RawRowStream for VecRawRowStream {
    fn next_raw(&mut self) -> Result<Option<RawRow>, InternalError> {
        if self.fail_after.is_some_and(|limit| self.yielded >= limit) {
            return Err(InternalError::session(format!(
                "row fetch failed after {} rows",
                self.yielded
            )));
        }

        let row = self.rows.pop_front();
        if row.is_some() {
            self.yielded += 1;
        }

        Ok(row)
    }
}

///
/// Session
///
/// Unit-of-work handle onto the persistence layer.
///
/// Sessions are single-owner and not shared across threads; sub-queries run
/// nested on the same session while a primary row is being materialized.
///

pub trait Session {
    /// Count rows matching the query criteria (grouping applied, no window).
    fn count(&mut self, query: &QuerySpec) -> Result<u64, InternalError>;

    /// Execute a projection query and return an owned cursor over its rows.
    fn open(&mut self, query: &ProjectionQuery) -> Result<Box<dyn RawRowStream>, InternalError>;

    /// Drop cached object references held by the session.
    fn decache(&mut self) -> Result<(), InternalError>;
}
