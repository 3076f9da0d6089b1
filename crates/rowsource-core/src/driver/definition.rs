use crate::{
    error::InternalError,
    materialize::{MaterializedRow, Materializer, RenderRegistry},
    model::EntityModel,
    obs::QueryFingerprint,
    plan::ProjectionPlan,
    query::{ColumnConfig, OrderTerm, QuerySpec, Window},
    session::ProjectionQuery,
};
use std::{collections::BTreeSet, fmt, sync::Arc};

/// Per-row progress label.
pub type ProgressLabel = Arc<dyn Fn(&MaterializedRow) -> String + Send + Sync>;

///
/// ReportDefinition
///
/// One report type as a value: entity model, query criteria, column set, and
/// the bound materializer. Built once and shared by every driver run.
///

pub struct ReportDefinition {
    name: String,
    model: Arc<EntityModel>,
    query: QuerySpec,
    columns: Vec<ColumnConfig>,
    materializer: Materializer,
    progress_label: Option<ProgressLabel>,
}

impl ReportDefinition {
    /// Validate the column set and bind it against `model`.
    pub fn new(
        name: impl Into<String>,
        model: Arc<EntityModel>,
        query: QuerySpec,
        columns: Vec<ColumnConfig>,
        registry: &RenderRegistry,
    ) -> Result<Self, InternalError> {
        let name = name.into();
        if model.name() != query.entity {
            return Err(InternalError::planner_input(format!(
                "report '{name}' queries '{}' but its model is '{}'",
                query.entity,
                model.name()
            )));
        }

        let mut seen = BTreeSet::new();
        for column in &columns {
            column.validate()?;
            if !seen.insert(column.field.as_str()) {
                return Err(InternalError::planner_input(format!(
                    "report '{name}' declares field '{}' more than once",
                    column.field
                )));
            }
        }

        let plan = ProjectionPlan::plan(&model, &columns);
        let materializer = Materializer::new(&model, &columns, plan, registry)?;

        Ok(Self {
            name,
            model,
            query,
            columns,
            materializer,
            progress_label: None,
        })
    }

    #[must_use]
    pub fn with_progress_label<F>(mut self, label: F) -> Self
    where
        F: Fn(&MaterializedRow) -> String + Send + Sync + 'static,
    {
        self.progress_label = Some(Arc::new(label));
        self
    }

    #[must_use]
    pub fn with_sub_query_order(mut self, order: Vec<OrderTerm>) -> Self {
        self.materializer = self.materializer.with_sub_query_order(order);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    #[must_use]
    pub const fn query(&self) -> &QuerySpec {
        &self.query
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnConfig] {
        &self.columns
    }

    #[must_use]
    pub const fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    #[must_use]
    pub const fn plan(&self) -> &ProjectionPlan {
        self.materializer.plan()
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        self.materializer.layout().fields()
    }

    #[must_use]
    pub fn progress_label(&self, row: &MaterializedRow) -> Option<String> {
        self.progress_label.as_ref().map(|label| label(row))
    }

    /// Projection query for this report under `window`.
    #[must_use]
    pub fn projection(&self, window: Window) -> ProjectionQuery {
        ProjectionQuery::new(self.query.clone(), self.plan().columns().to_vec()).with_window(window)
    }

    #[must_use]
    pub fn fingerprint(&self) -> QueryFingerprint {
        QueryFingerprint::of(&self.query, self.plan().columns())
    }
}

impl fmt::Debug for ReportDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDefinition")
            .field("name", &self.name)
            .field("query", &self.query)
            .field("columns", &self.columns)
            .field("plan", self.plan())
            .finish_non_exhaustive()
    }
}
