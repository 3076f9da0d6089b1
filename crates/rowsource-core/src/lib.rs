//! Core runtime for rowsource: column planning, row materialization, the
//! streaming iteration driver, and the ordered multi-source merge that report
//! data sources are assembled from.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod driver;
pub mod error;
pub mod expand;
pub mod materialize;
pub mod merge;
pub mod model;
pub mod obs;
pub mod plan;
pub mod query;
pub mod session;
pub mod source;
pub mod stream;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Estimated row count above which the driver switches to chunked paging.
pub const DEFAULT_INCREMENTAL_THRESHOLD: u64 = 10_000;

/// Rows fetched per page by the incremental cursor.
pub const DEFAULT_PAGE_SIZE: u64 = 500;

/// Rows emitted between session decaches in the ordered merge.
pub const DEFAULT_MERGE_DECACHE_INTERVAL: u64 = 100;

/// Rows emitted between progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sessions, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        driver::{DecachePolicy, DriverOptions, ReportDefinition, StreamingDriver},
        materialize::{MaterializedRow, RawRow},
        merge::{OrderedMerge, SortKey},
        model::{EntityModel, FieldKind},
        query::{ColumnConfig, Direction, OrderTerm, Predicate, QuerySpec, Window},
        source::DataSource,
        stream::RowStream,
        value::Value,
    };
}
