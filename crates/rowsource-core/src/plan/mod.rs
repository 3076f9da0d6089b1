//! Module: plan
//! Responsibility: derive the minimal, ordered projection fetch list for a
//! column set.
//! Does not own: per-key extraction; the materializer re-applies that per column.

#[cfg(test)]
mod tests;

use crate::{model::EntityModel, query::ColumnConfig};
use derive_more::{Deref, IntoIterator};

///
/// ProjectionPlan
///
/// Deduplicated, insertion-ordered projection columns.
/// Attribute paths are truncated to their container root so one fetch
/// satisfies every key under that container.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
pub struct ProjectionPlan {
    #[into_iterator(owned, ref)]
    columns: Vec<String>,
}

impl ProjectionPlan {
    /// Plan the fetch list for `columns` against `model`.
    ///
    /// Per column, in order: the primary property (or the sub-query key for
    /// sub-query columns), the fallback property, then every script argument.
    #[must_use]
    pub fn plan(model: &EntityModel, columns: &[ColumnConfig]) -> Self {
        let mut plan = Self::default();

        for column in columns {
            match (&column.sub_query_key, &column.property) {
                (Some(key), _) => plan.push_property(model, key),
                (None, Some(property)) => plan.push_property(model, property),
                (None, None) => {}
            }
            if let Some(fallback) = &column.if_empty_property {
                plan.push_property(model, fallback);
            }
            for argument in &column.script_arguments {
                plan.push_property(model, argument);
            }
        }

        plan
    }

    /// Position of one fetch path in the projected tuple.
    #[must_use]
    pub fn position(&self, fetch_path: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == fetch_path)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn push_property(&mut self, model: &EntityModel, property: &str) {
        let access = model.resolve(property);
        let fetch = access.fetch_path();

        if !self.columns.iter().any(|column| column == fetch) {
            self.columns.push(fetch.to_string());
        }
    }
}
