use crate::{
    error::InternalError,
    materialize::RawRow,
    obs::TraceScope,
    query::Window,
    session::{ProjectionQuery, RawRowStream, Session},
};
use tracing::debug;

///
/// RowCursor
///
/// Open cursor owned by one driver run.
///

pub(crate) enum RowCursor {
    Single(Box<dyn RawRowStream>),
    Incremental(IncrementalCursor),
}

impl RowCursor {
    pub(crate) fn next_raw(
        &mut self,
        session: &mut dyn Session,
    ) -> Result<Option<RawRow>, InternalError> {
        match self {
            Self::Single(stream) => stream.next_raw(),
            Self::Incremental(cursor) => cursor.next_raw(session),
        }
    }
}

///
/// IncrementalCursor
///
/// Re-issues the projection query in bounded pages and exposes one logical
/// stream. Pages are carved out of the caller's window; a short page ends
/// iteration.
///

pub(crate) struct IncrementalCursor {
    query: ProjectionQuery,
    base: Window,
    page_size: u64,
    consumed: u64,
    page: Option<Page>,
    done: bool,
    trace: TraceScope,
}

struct Page {
    stream: Box<dyn RawRowStream>,
    requested: u64,
    yielded: u64,
}

impl IncrementalCursor {
    pub(crate) fn new(query: ProjectionQuery, page_size: u64, trace: TraceScope) -> Self {
        let base = query.window;

        Self {
            query,
            base,
            page_size: page_size.max(1),
            consumed: 0,
            page: None,
            done: false,
            trace,
        }
    }

    fn next_raw(&mut self, session: &mut dyn Session) -> Result<Option<RawRow>, InternalError> {
        loop {
            if let Some(page) = &mut self.page {
                if let Some(row) = page.stream.next_raw()? {
                    page.yielded += 1;
                    self.consumed += 1;
                    return Ok(Some(row));
                }
                let short = page.yielded < page.requested;
                self.page = None;
                if short {
                    self.done = true;
                }
            }

            if self.done {
                return Ok(None);
            }

            let remaining = self
                .base
                .limit
                .map_or(u64::MAX, |limit| limit.saturating_sub(self.consumed));
            if remaining == 0 {
                self.done = true;
                return Ok(None);
            }

            let requested = self.page_size.min(remaining);
            let offset = self.base.offset.saturating_add(self.consumed);
            let page_query = self
                .query
                .clone()
                .with_window(Window::new(offset, Some(requested)));

            debug!(entity = %self.query.spec.entity, offset, requested, "opening page");
            self.trace.page(offset, requested);
            self.page = Some(Page {
                stream: session.open(&page_query)?,
                requested,
                yielded: 0,
            });
        }
    }
}
