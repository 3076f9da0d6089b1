//! Module: query
//! Responsibility: query shape (entity, criteria, order, grouping), column
//! descriptors, and the paging window.
//! Does not own: execution; sessions interpret these values.

mod column;
mod predicate;


use derive_more::Display;
use std::fmt;

// re-exports
pub use column::{ColumnConfig, RenderDefinition};
pub use predicate::{CompareOp, ComparePredicate, Predicate, Row};

///
/// Direction
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum Direction {
    #[default]
    #[display("asc")]
    Asc,
    #[display("desc")]
    Desc,
}

///
/// OrderTerm
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderTerm {
    pub path: String,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Desc,
        }
    }
}

///
/// QuerySpec
///
/// Entity plus filter, sort, and group criteria.
/// Paging is deliberately absent; see [`Window`].
///

#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    pub entity: String,
    pub predicate: Predicate,
    pub order: Vec<OrderTerm>,
    pub group_by: Vec<String>,
}

impl QuerySpec {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: Predicate::True,
            order: Vec::new(),
            group_by: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    #[must_use]
    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.order.push(term);
        self
    }

    #[must_use]
    pub fn group_by(mut self, path: impl Into<String>) -> Self {
        self.group_by.push(path.into());
        self
    }

    /// Entity and filter criteria only, for auxiliary chart queries.
    #[must_use]
    pub fn base_query(&self) -> BaseQuery {
        BaseQuery {
            entity: self.entity.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} where {}", self.entity, self.predicate)?;
        if !self.order.is_empty() {
            f.write_str(" order by ")?;
            for (idx, term) in self.order.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{} {}", term.path, term.direction)?;
            }
        }
        if !self.group_by.is_empty() {
            write!(f, " group by {}", self.group_by.join(", "))?;
        }

        Ok(())
    }
}

///
/// BaseQuery
///
/// Unpaged query shape exposed to the reporting engine for chart rendering.
///

#[derive(Clone, Debug, PartialEq)]
pub struct BaseQuery {
    pub entity: String,
    pub predicate: Predicate,
}

///
/// Window
///
/// Offset and optional row limit applied to a projected query.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Window {
    /// The unbounded window.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            offset: 0,
            limit: None,
        }
    }

    #[must_use]
    pub const fn new(offset: u64, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    /// Live-report paging: `page` is zero-based.
    #[must_use]
    pub const fn page(page: u64, page_size: u64) -> Self {
        Self {
            offset: page.saturating_mul(page_size),
            limit: Some(page_size),
        }
    }

    /// Number of rows this window keeps out of `total` matching rows.
    #[must_use]
    pub fn clamp_count(self, total: u64) -> u64 {
        let available = total.saturating_sub(self.offset);
        self.limit.map_or(available, |limit| available.min(limit))
    }
}
