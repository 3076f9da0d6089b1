use crate::{
    error::InternalError,
    materialize::RawRow,
    query::{Direction, OrderTerm, QuerySpec, Row},
    session::{ProjectionQuery, RawRowStream, Session, VecRawRowStream},
    value::{Value, canonical_cmp},
};
use std::{cmp::Ordering, collections::BTreeMap};
use tracing::debug;

///
/// SessionStats
///
/// Call counters kept by [`MemorySession`] so callers can observe cursor
/// and decache behavior.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionStats {
    pub counts: u64,
    pub opens: u64,
    pub decaches: u64,
    pub rows_fetched: u64,
    /// Objects held since the last decache.
    pub cached_objects: u64,
    pub peak_cached_objects: u64,
}

///
/// MemorySession
///
/// In-memory session over map-shaped records grouped by entity name.
///
/// Paths are navigated segment by segment through nested maps; a key that
/// literally contains dots is matched before splitting. Ordering is stable
/// under the canonical value order, grouping keeps the first row of each
/// group, and the window is applied last.
///

#[derive(Clone, Debug, Default)]
pub struct MemorySession {
    entities: BTreeMap<String, Vec<Value>>,
    stats: SessionStats,
    fail_after_opens: Option<u64>,
    fail_after_rows: Option<usize>,
    fail_counts: bool,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from records keyed by entity name.
    #[must_use]
    pub fn from_entities(entities: BTreeMap<String, Vec<Value>>) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_records(mut self, entity: impl Into<String>, records: Vec<Value>) -> Self {
        self.entities.entry(entity.into()).or_default().extend(records);
        self
    }

    pub fn insert(&mut self, entity: impl Into<String>, record: Value) {
        self.entities.entry(entity.into()).or_default().push(record);
    }

    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Let `opens` projection queries succeed, then fail every later open.
    #[must_use]
    pub const fn fail_after_opens(mut self, opens: u64) -> Self {
        self.fail_after_opens = Some(opens);
        self
    }

    /// Every opened cursor fails once it has yielded `rows` rows.
    #[must_use]
    pub const fn fail_after_rows(mut self, rows: usize) -> Self {
        self.fail_after_rows = Some(rows);
        self
    }

    /// Every count query fails.
    #[must_use]
    pub const fn fail_counts(mut self) -> Self {
        self.fail_counts = true;
        self
    }

    // Matching records in query order, grouping applied.
    fn select(&self, spec: &QuerySpec) -> Result<Vec<&Value>, InternalError> {
        let records = self
            .entities
            .get(&spec.entity)
            .ok_or_else(|| InternalError::session(format!("unknown entity '{}'", spec.entity)))?;

        let mut selected: Vec<&Value> = records
            .iter()
            .filter(|record| spec.predicate.evaluate(&RecordRow(record)))
            .collect();

        if !spec.order.is_empty() {
            selected.sort_by(|left, right| compare_records(left, right, &spec.order));
        }

        if !spec.group_by.is_empty() {
            let mut seen: Vec<Vec<Value>> = Vec::new();
            selected.retain(|record| {
                let key: Vec<Value> = spec
                    .group_by
                    .iter()
                    .map(|path| lookup(record, path).cloned().unwrap_or_default())
                    .collect();
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            });
        }

        Ok(selected)
    }

    fn note_loaded(&mut self, rows: u64) {
        self.stats.rows_fetched += rows;
        self.stats.cached_objects += rows;
        self.stats.peak_cached_objects = self
            .stats
            .peak_cached_objects
            .max(self.stats.cached_objects);
    }
}

impl Session for MemorySession {
    fn count(&mut self, query: &QuerySpec) -> Result<u64, InternalError> {
        if self.fail_counts {
            return Err(InternalError::session(format!(
                "count failed for entity '{}'",
                query.entity
            )));
        }
        self.stats.counts += 1;

        let count = self.select(query)?.len();

        Ok(count as u64)
    }

    fn open(&mut self, query: &ProjectionQuery) -> Result<Box<dyn RawRowStream>, InternalError> {
        if query.columns.is_empty() {
            return Err(InternalError::session_unsupported(
                "projection queries need at least one column",
            ));
        }
        if self
            .fail_after_opens
            .is_some_and(|limit| self.stats.opens >= limit)
        {
            return Err(InternalError::session(format!(
                "projection query failed for entity '{}'",
                query.spec.entity
            )));
        }
        self.stats.opens += 1;

        let offset = usize::try_from(query.window.offset).unwrap_or(usize::MAX);
        let limit = query
            .window
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        let rows: Vec<RawRow> = self
            .select(&query.spec)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|record| {
                RawRow(
                    query
                        .columns
                        .iter()
                        .map(|path| lookup(record, path).cloned().unwrap_or_default())
                        .collect(),
                )
            })
            .collect();

        debug!(
            entity = %query.spec.entity,
            offset = query.window.offset,
            rows = rows.len(),
            "memory session projection"
        );
        self.note_loaded(rows.len() as u64);

        let stream = VecRawRowStream::new(rows);
        Ok(match self.fail_after_rows {
            Some(after) => Box::new(stream.failing_after(after)),
            None => Box::new(stream),
        })
    }

    fn decache(&mut self) -> Result<(), InternalError> {
        self.stats.decaches += 1;
        self.stats.cached_objects = 0;

        Ok(())
    }
}

///
/// RecordRow
///

struct RecordRow<'a>(&'a Value);

impl Row for RecordRow<'_> {
    fn value_at(&self, path: &str) -> Option<&Value> {
        lookup(self.0, path)
    }
}

// Navigate a dotted path through nested maps.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get_key(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;

    lookup(record.get_key(head)?, rest)
}

fn compare_records(left: &Value, right: &Value, order: &[OrderTerm]) -> Ordering {
    for term in order {
        let ordering = canonical_cmp(
            lookup(left, &term.path).unwrap_or(&Value::Null),
            lookup(right, &term.path).unwrap_or(&Value::Null),
        );
        let ordering = match term.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

