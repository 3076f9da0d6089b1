//! Module: materialize
//! Responsibility: turn one positional raw row into a named record.
//! Does not own: fetch-list derivation (plan) or cursor lifecycle (driver).
//! Boundary: sub-query columns issue nested projection queries on the caller's session.

mod render;
mod row;


use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{EntityModel, PropertyAccess},
    plan::ProjectionPlan,
    query::{ColumnConfig, OrderTerm, Predicate, QuerySpec},
    session::{ProjectionQuery, Session},
    value::{Value, values_equal},
};
use std::sync::Arc;
use tracing::warn;

// re-exports
pub use render::{RenderArgs, RenderRegistry, ValueRenderer};
pub use row::{MaterializedRow, RawRow, RowLayout};

///
/// BoundProperty
///
/// One property path resolved against the model and the projection plan.
///

#[derive(Clone, Debug)]
struct BoundProperty {
    access: PropertyAccess,
    position: usize,
}

impl BoundProperty {
    fn bind(model: &EntityModel, plan: &ProjectionPlan, path: &str) -> Result<Self, InternalError> {
        let access = model.resolve(path);
        let position = plan.position(access.fetch_path()).ok_or_else(|| {
            InternalError::new(
                ErrorClass::InvariantViolation,
                ErrorOrigin::Materializer,
                format!(
                    "projection plan does not fetch '{}' for property '{path}'",
                    access.fetch_path()
                ),
            )
        })?;

        Ok(Self { access, position })
    }

    fn read(&self, raw: &RawRow) -> Value {
        self.access.extract(&raw[self.position])
    }
}

///
/// BoundColumn
///

struct BoundColumn {
    config: ColumnConfig,
    primary: Option<BoundProperty>,
    fallback: Option<BoundProperty>,
    sub_query: Option<SubQuery>,
    arguments: Vec<(String, BoundProperty)>,
    renderer: Option<Arc<dyn ValueRenderer>>,
}

///
/// SubQuery
///
/// Correlated secondary query: collects `property` across every row of the
/// entity whose `key` equals the current row's key.
///

struct SubQuery {
    key: BoundProperty,
    property: PropertyAccess,
}

///
/// Materializer
///
/// Column set bound to one entity model and projection plan.
/// Binding happens once; per-row work is position lookups plus any
/// sub-queries and renderers the columns declare.
///

pub struct Materializer {
    entity: String,
    layout: Arc<RowLayout>,
    plan: ProjectionPlan,
    columns: Vec<BoundColumn>,
    sub_query_order: Vec<OrderTerm>,
}

impl Materializer {
    pub fn new(
        model: &EntityModel,
        columns: &[ColumnConfig],
        plan: ProjectionPlan,
        registry: &RenderRegistry,
    ) -> Result<Self, InternalError> {
        let layout = RowLayout::new(columns.iter().map(|column| column.field.clone()).collect())?;

        let bound = columns
            .iter()
            .map(|column| bind_column(model, &plan, registry, column))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entity: model.name().to_string(),
            layout: Arc::new(layout),
            plan,
            columns: bound,
            sub_query_order: Vec::new(),
        })
    }

    /// Order applied to every sub-query; first-seen order follows it.
    #[must_use]
    pub fn with_sub_query_order(mut self, order: Vec<OrderTerm>) -> Self {
        self.sub_query_order = order;
        self
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub const fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    #[must_use]
    pub const fn plan(&self) -> &ProjectionPlan {
        &self.plan
    }

    /// Build the named record for one raw row.
    ///
    /// Every column yields exactly one field. A failing column fails the whole
    /// row unless it is flagged best-effort, in which case it becomes Null.
    pub fn materialize(
        &self,
        raw: &RawRow,
        session: &mut dyn Session,
    ) -> Result<MaterializedRow, InternalError> {
        if raw.len() != self.plan.len() {
            return Err(InternalError::session(format!(
                "projection returned {} values, expected {}",
                raw.len(),
                self.plan.len()
            )));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = match self.column_value(column, raw, session) {
                Ok(value) => value,
                Err(err) if column.config.best_effort => {
                    warn!(
                        field = %column.config.field,
                        error = %err.display_with_class(),
                        "best-effort column failed; using null"
                    );
                    Value::Null
                }
                Err(err) => return Err(err.context(format_args!("column '{}'", column.config.field))),
            };
            values.push(value);
        }

        MaterializedRow::new(self.layout.clone(), values)
    }

    fn column_value(
        &self,
        column: &BoundColumn,
        raw: &RawRow,
        session: &mut dyn Session,
    ) -> Result<Value, InternalError> {
        let mut value = match (&column.sub_query, &column.primary) {
            (Some(sub_query), _) => self.collect_sub_query(sub_query, raw, session)?,
            (None, Some(primary)) => primary.read(raw),
            (None, None) => Value::Null,
        };

        if value.is_blank()
            && let Some(fallback) = &column.fallback
        {
            value = fallback.read(raw);
        }

        match &column.renderer {
            Some(renderer) => {
                let args: RenderArgs = column
                    .arguments
                    .iter()
                    .map(|(name, argument)| (name.clone(), argument.read(raw)))
                    .collect();
                renderer.render(value, &args)
            }
            None => Ok(value),
        }
    }

    fn collect_sub_query(
        &self,
        sub_query: &SubQuery,
        raw: &RawRow,
        session: &mut dyn Session,
    ) -> Result<Value, InternalError> {
        let key = sub_query.key.read(raw);
        if key.is_null() {
            return Ok(Value::List(Vec::new()));
        }

        let mut spec = QuerySpec::new(&self.entity)
            .filter(Predicate::eq(sub_query.key.access.full_path(), key));
        spec.order.clone_from(&self.sub_query_order);
        let query = ProjectionQuery::new(spec, vec![sub_query.property.fetch_path().to_string()]);

        let mut stream = session.open(&query)?;
        let mut collected: Vec<Value> = Vec::new();
        while let Some(row) = stream.next_raw()? {
            let fetched = row.first().ok_or_else(|| {
                InternalError::materializer_evaluation("sub-query returned an empty row")
            })?;
            let value = sub_query.property.extract(fetched);
            if !value.is_null() && !collected.iter().any(|seen| values_equal(seen, &value)) {
                collected.push(value);
            }
        }

        Ok(Value::List(collected))
    }
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("entity", &self.entity)
            .field("fields", &self.layout.fields())
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

fn bind_column(
    model: &EntityModel,
    plan: &ProjectionPlan,
    registry: &RenderRegistry,
    column: &ColumnConfig,
) -> Result<BoundColumn, InternalError> {
    let (primary, sub_query) = match (&column.sub_query_key, &column.property) {
        (Some(key), Some(property)) => (
            None,
            Some(SubQuery {
                key: BoundProperty::bind(model, plan, key)?,
                property: model.resolve(property),
            }),
        ),
        (None, Some(property)) => (Some(BoundProperty::bind(model, plan, property)?), None),
        _ => (None, None),
    };

    let fallback = column
        .if_empty_property
        .as_deref()
        .map(|path| BoundProperty::bind(model, plan, path))
        .transpose()?;

    let arguments = column
        .script_arguments
        .iter()
        .map(|path| Ok((path.clone(), BoundProperty::bind(model, plan, path)?)))
        .collect::<Result<Vec<_>, InternalError>>()?;

    let renderer = match &column.render {
        Some(definition) => Some(registry.get(&definition.renderer).ok_or_else(|| {
            InternalError::invalid_input(
                ErrorOrigin::Render,
                format!(
                    "column '{}' uses unknown renderer '{}'",
                    column.field, definition.renderer
                ),
            )
        })?),
        None => None,
    };

    Ok(BoundColumn {
        config: column.clone(),
        primary,
        fallback,
        sub_query,
        arguments,
        renderer,
    })
}
