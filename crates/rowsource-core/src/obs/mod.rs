//! Report execution tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect iteration semantics.


use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    query::QuerySpec,
};
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc};

///
/// ReportTraceSink
///

pub trait ReportTraceSink: Send + Sync {
    fn on_event(&self, event: ReportTraceEvent);
}

///
/// CursorMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorMode {
    /// One unbounded projection query.
    Single,
    /// Chunked paging, re-issuing the query per page.
    Incremental { page_size: u64 },
}

///
/// ReportTraceEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportTraceEvent {
    Open {
        fingerprint: QueryFingerprint,
        mode: CursorMode,
        estimate: u64,
    },
    Page {
        fingerprint: QueryFingerprint,
        offset: u64,
        limit: u64,
    },
    Decache {
        fingerprint: QueryFingerprint,
        rows: u64,
    },
    Finish {
        fingerprint: QueryFingerprint,
        rows: u64,
    },
    Error {
        fingerprint: QueryFingerprint,
        class: ErrorClass,
        origin: ErrorOrigin,
    },
}

///
/// QueryFingerprint
///
/// Stable SHA-256 over the canonical query text and projected columns.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    #[must_use]
    pub fn of(spec: &QuerySpec, columns: &[String]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"queryfp:v1");
        write_str(&mut hasher, &spec.to_string());
        for column in columns {
            hasher.update([0x01]);
            write_str(&mut hasher, column);
        }
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);

        Self(out)
    }

    #[must_use]
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
    hasher.update(len.to_be_bytes());
    hasher.update(value.as_bytes());
}

///
/// TraceScope
///
/// Emits events for one driver run when a sink is installed.
///

#[derive(Clone)]
pub(crate) struct TraceScope {
    sink: Option<Arc<dyn ReportTraceSink>>,
    fingerprint: QueryFingerprint,
}

impl TraceScope {
    pub(crate) fn new(sink: Option<Arc<dyn ReportTraceSink>>, fingerprint: QueryFingerprint) -> Self {
        Self { sink, fingerprint }
    }

    pub(crate) const fn fingerprint(&self) -> QueryFingerprint {
        self.fingerprint
    }

    pub(crate) fn set_sink(&mut self, sink: Arc<dyn ReportTraceSink>) {
        self.sink = Some(sink);
    }

    fn emit(&self, event: ReportTraceEvent) {
        if let Some(sink) = &self.sink {
            sink.on_event(event);
        }
    }

    pub(crate) fn open(&self, mode: CursorMode, estimate: u64) {
        self.emit(ReportTraceEvent::Open {
            fingerprint: self.fingerprint,
            mode,
            estimate,
        });
    }

    pub(crate) fn page(&self, offset: u64, limit: u64) {
        self.emit(ReportTraceEvent::Page {
            fingerprint: self.fingerprint,
            offset,
            limit,
        });
    }

    pub(crate) fn decache(&self, rows: u64) {
        self.emit(ReportTraceEvent::Decache {
            fingerprint: self.fingerprint,
            rows,
        });
    }

    pub(crate) fn finish(&self, rows: u64) {
        self.emit(ReportTraceEvent::Finish {
            fingerprint: self.fingerprint,
            rows,
        });
    }

    pub(crate) fn error(&self, err: &InternalError) {
        self.emit(ReportTraceEvent::Error {
            fingerprint: self.fingerprint,
            class: err.class,
            origin: err.origin,
        });
    }
}
