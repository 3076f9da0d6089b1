//! On-disk TOML shape of a report file.
//!
//! Everything here is plain data; validation and conversion into core types
//! live in `report`.

use rowsource_core::{
    DEFAULT_INCREMENTAL_THRESHOLD, DEFAULT_MERGE_DECACHE_INTERVAL, DEFAULT_PAGE_SIZE,
    DEFAULT_PROGRESS_INTERVAL, value::Value,
};
use serde::Deserialize;

///
/// ReportFile
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportFile {
    pub name: String,

    #[serde(default)]
    pub driver: DriverSection,

    #[serde(default)]
    pub entities: Vec<EntitySection>,

    #[serde(default)]
    pub sources: Vec<SourceSection>,

    #[serde(default)]
    pub merge: Option<MergeSection>,
}

///
/// DriverSection
///

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverSection {
    pub incremental_threshold: u64,
    pub page_size: u64,
    /// Rows between decaches: 0 never, 1 every row.
    pub decache_interval: u64,
    pub progress_interval: u64,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            incremental_threshold: DEFAULT_INCREMENTAL_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            decache_interval: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

///
/// EntitySection
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySection {
    pub name: String,

    #[serde(default)]
    pub extended_attributes: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldSection>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSection {
    pub name: String,

    #[serde(default)]
    pub kind: FieldKindSetting,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindSetting {
    #[default]
    Scalar,
    Reference,
    Attributes,
}

///
/// SourceSection
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    pub entity: String,

    /// Defaults to the report name.
    #[serde(default)]
    pub name: Option<String>,

    pub columns: Vec<ColumnSection>,

    #[serde(default)]
    pub filter: Vec<ClauseSection>,

    #[serde(default)]
    pub order: Vec<OrderSection>,

    #[serde(default)]
    pub group_by: Vec<String>,

    #[serde(default)]
    pub sub_query_order: Vec<OrderSection>,

    /// Evaluated against materialized rows; non-matching rows are skipped.
    #[serde(default)]
    pub row_filter: Vec<ClauseSection>,

    /// Output field whose value labels progress updates.
    #[serde(default)]
    pub progress_label: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSection {
    pub field: String,

    #[serde(default)]
    pub property: Option<String>,

    #[serde(default)]
    pub if_empty: Option<String>,

    #[serde(default)]
    pub sub_query: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub render: Option<String>,

    #[serde(default)]
    pub best_effort: bool,
}

///
/// ClauseSection
///
/// One comparison; clauses in a list are AND-ed.
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClauseSection {
    pub field: String,
    pub op: ClauseOp,

    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ClauseOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    IsEmpty,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderSection {
    pub path: String,

    #[serde(default)]
    pub direction: DirectionSetting,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSetting {
    #[default]
    Asc,
    Desc,
}

///
/// MergeSection
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeSection {
    /// Output fields compared in order; every source must be sorted by them.
    pub order: Vec<OrderSection>,

    #[serde(default = "default_merge_decache_interval")]
    pub decache_interval: u64,
}

const fn default_merge_decache_interval() -> u64 {
    DEFAULT_MERGE_DECACHE_INTERVAL
}
