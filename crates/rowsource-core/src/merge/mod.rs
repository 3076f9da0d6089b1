//! Module: merge
//! Responsibility: k-way ordered merge of independently ordered row streams.
//! Does not own: per-source ordering; every source must already be sorted
//! under the same comparator.

#[cfg(test)]
mod tests;

use crate::{
    DEFAULT_MERGE_DECACHE_INTERVAL,
    driver::DecachePolicy,
    error::{ErrorClass, ErrorOrigin, InternalError},
    materialize::MaterializedRow,
    query::{BaseQuery, Direction},
    session::Session,
    stream::RowStream,
    value::{Value, canonical_cmp},
};
use std::{cmp::Ordering, fmt};
use tracing::debug;

///
/// SortKey
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

///
/// RowComparator
///
/// Lexicographic order over named fields under the canonical value order.
/// Null and missing fields sort first in ascending keys.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RowComparator {
    keys: Vec<SortKey>,
}

impl RowComparator {
    #[must_use]
    pub const fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    #[must_use]
    pub fn compare(&self, left: &MaterializedRow, right: &MaterializedRow) -> Ordering {
        for key in &self.keys {
            let ordering = canonical_cmp(
                left.get(&key.field).unwrap_or(&Value::Null),
                right.get(&key.field).unwrap_or(&Value::Null),
            );
            let ordering = match key.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }
}

///
/// Slot
///
/// One source plus its single buffered candidate.
///

struct Slot {
    stream: Box<dyn RowStream>,
    candidate: Option<MaterializedRow>,
}

///
/// OrderedMerge
///
/// Tournament-of-candidates merge. Each advance emits the minimum buffered
/// candidate and refills only that slot, so at most one pending row per
/// source is held. Ties go to the lower source index; exhausted sources
/// never win.
///

pub struct OrderedMerge {
    label: String,
    slots: Vec<Slot>,
    comparator: RowComparator,
    primed: bool,
    exhausted: bool,
    emitted: u64,
    last_winner: Option<usize>,
    decache: DecachePolicy,
}

impl OrderedMerge {
    #[must_use]
    pub fn new(label: impl Into<String>, sources: Vec<Box<dyn RowStream>>, keys: Vec<SortKey>) -> Self {
        Self {
            label: label.into(),
            slots: sources
                .into_iter()
                .map(|stream| Slot {
                    stream,
                    candidate: None,
                })
                .collect(),
            comparator: RowComparator::new(keys),
            primed: false,
            exhausted: false,
            emitted: 0,
            last_winner: None,
            decache: DecachePolicy::Every(DEFAULT_MERGE_DECACHE_INTERVAL),
        }
    }

    #[must_use]
    pub const fn with_decache(mut self, decache: DecachePolicy) -> Self {
        self.decache = decache;
        self
    }

    #[must_use]
    pub const fn comparator(&self) -> &RowComparator {
        &self.comparator
    }

    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.slots.len()
    }

    fn refill(&mut self, idx: usize, session: &mut dyn Session) -> Result<(), InternalError> {
        let slot = &mut self.slots[idx];
        slot.candidate = slot
            .stream
            .next_row(session)
            .map_err(|err| err.context(format_args!("merge source {idx}")))?;

        Ok(())
    }

    // Lowest candidate; strict comparison keeps the earlier index on ties.
    fn winner(&self) -> Option<usize> {
        let mut best: Option<(usize, &MaterializedRow)> = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(candidate) = &slot.candidate else {
                continue;
            };
            match best {
                Some((_, current)) if self.comparator.compare(candidate, current) != Ordering::Less => {}
                _ => best = Some((idx, candidate)),
            }
        }

        best.map(|(idx, _)| idx)
    }

    fn fail(&mut self, err: InternalError) -> InternalError {
        self.close();
        debug!(merge = %self.label, emitted = self.emitted, error = %err, "merge failed");

        err
    }

    fn step(&mut self, session: &mut dyn Session) -> Result<Option<MaterializedRow>, InternalError> {
        if !self.primed {
            self.primed = true;
            for idx in 0..self.slots.len() {
                self.refill(idx, session)?;
            }
        }

        let Some(idx) = self.winner() else {
            debug!(merge = %self.label, emitted = self.emitted, "merge exhausted");
            self.close();
            return Ok(None);
        };

        let row = self.slots[idx].candidate.take().ok_or_else(|| {
            InternalError::new(
                ErrorClass::InvariantViolation,
                ErrorOrigin::Merge,
                format!("merge slot {idx} lost its candidate"),
            )
        })?;
        self.refill(idx, session)?;

        self.emitted += 1;
        self.last_winner = Some(idx);
        if self.decache.is_due(self.emitted) {
            session.decache()?;
            debug!(merge = %self.label, emitted = self.emitted, "merge decache");
        }

        Ok(Some(row))
    }
}

impl RowStream for OrderedMerge {
    fn next_row(
        &mut self,
        session: &mut dyn Session,
    ) -> Result<Option<MaterializedRow>, InternalError> {
        if self.exhausted {
            return Ok(None);
        }

        self.step(session).map_err(|err| self.fail(err))
    }

    /// Sum of the source estimates.
    fn estimate_row_count(&mut self, session: &mut dyn Session) -> Result<u64, InternalError> {
        let mut total = 0u64;
        for slot in &mut self.slots {
            total = total.saturating_add(slot.stream.estimate_row_count(session)?);
        }

        Ok(total)
    }

    fn base_query(&self) -> Option<BaseQuery> {
        self.slots.first().and_then(|slot| slot.stream.base_query())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    fn progress_label(&self, row: &MaterializedRow) -> Option<String> {
        self.last_winner
            .and_then(|idx| self.slots.get(idx))
            .and_then(|slot| slot.stream.progress_label(row))
    }

    fn close(&mut self) {
        for slot in &mut self.slots {
            slot.candidate = None;
            slot.stream.close();
        }
        self.exhausted = true;
    }
}

impl fmt::Debug for OrderedMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMerge")
            .field("label", &self.label)
            .field("sources", &self.slots.len())
            .field("comparator", &self.comparator)
            .field("emitted", &self.emitted)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}
