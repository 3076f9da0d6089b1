use crate::{
    error::ConfigError,
    file::{
        ClauseOp, ClauseSection, ColumnSection, DirectionSetting, EntitySection,
        FieldKindSetting, MergeSection, OrderSection, ReportFile, SourceSection,
    },
};
use rowsource_core::{
    driver::{DecachePolicy, DriverOptions, ReportDefinition, StreamingDriver},
    materialize::RenderRegistry,
    merge::{OrderedMerge, SortKey},
    model::{EntityModel, FieldKind},
    query::{
        ColumnConfig, CompareOp, Direction, OrderTerm, Predicate, QuerySpec, RenderDefinition,
        Window,
    },
    source::DataSource,
    stream::RowStream,
    value::Value,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

///
/// Report
///
/// A validated report: one or more bound sources plus the tuning that drives
/// them. Multi-source reports always carry a merge plan.
///

#[derive(Debug)]
pub struct Report {
    name: String,
    sources: Vec<ReportSource>,
    driver: DriverOptions,
    progress_interval: u64,
    merge: Option<MergePlan>,
}

///
/// ReportSource
///

#[derive(Debug)]
pub struct ReportSource {
    pub definition: Arc<ReportDefinition>,
    pub row_filter: Option<Predicate>,
}

///
/// MergePlan
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MergePlan {
    pub keys: Vec<SortKey>,
    pub decache: DecachePolicy,
}

impl Report {
    /// Validate a parsed report file and bind every source.
    pub fn build(file: ReportFile, registry: &RenderRegistry) -> Result<Self, ConfigError> {
        if file.sources.is_empty() {
            return Err(ConfigError::invalid(format!(
                "report '{}' declares no sources",
                file.name
            )));
        }
        if file.driver.page_size == 0 {
            return Err(ConfigError::invalid("driver.page_size must be at least 1"));
        }

        let models = entity_models(&file.entities)?;
        let sources = file
            .sources
            .iter()
            .map(|source| build_source(&file.name, source, &models, registry))
            .collect::<Result<Vec<_>, _>>()?;

        let merge = match (&file.merge, sources.len()) {
            (Some(section), _) => Some(merge_plan(section, &sources)?),
            (None, 1) => None,
            (None, count) => {
                return Err(ConfigError::invalid(format!(
                    "report '{}' has {count} sources but no [merge] order",
                    file.name
                )));
            }
        };

        let driver = DriverOptions::default()
            .with_threshold(file.driver.incremental_threshold)
            .with_page_size(file.driver.page_size)
            .with_decache(decache_policy(file.driver.decache_interval));

        debug!(
            report = %file.name,
            sources = sources.len(),
            merged = merge.is_some(),
            "report config built"
        );

        Ok(Self {
            name: file.name,
            sources,
            driver,
            progress_interval: file.driver.progress_interval,
            merge,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sources(&self) -> &[ReportSource] {
        &self.sources
    }

    #[must_use]
    pub const fn driver_options(&self) -> &DriverOptions {
        &self.driver
    }

    #[must_use]
    pub const fn merge(&self) -> Option<&MergePlan> {
        self.merge.as_ref()
    }

    #[must_use]
    pub const fn progress_interval(&self) -> u64 {
        self.progress_interval
    }

    /// Driver for one source. Under a merge the merge owns decaching.
    pub fn driver(&self, index: usize, window: Window) -> Result<StreamingDriver, ConfigError> {
        let source = self.sources.get(index).ok_or_else(|| {
            ConfigError::invalid(format!(
                "report '{}' has no source {index}",
                self.name
            ))
        })?;

        let mut options = self.driver.with_window(window);
        if self.merge.is_some() {
            options = options.with_decache(DecachePolicy::Never);
        }

        let driver = StreamingDriver::new(source.definition.clone(), options);
        Ok(match &source.row_filter {
            Some(filter) => driver.with_row_filter(filter.clone()),
            None => driver,
        })
    }

    /// The report's row stream: a single driver, or the ordered merge of all
    /// sources. Windows only apply to single-source reports.
    pub fn stream(&self, window: Window) -> Result<Box<dyn RowStream>, ConfigError> {
        let Some(plan) = &self.merge else {
            return Ok(Box::new(self.driver(0, window)?));
        };

        if window != Window::all() {
            return Err(ConfigError::invalid(format!(
                "report '{}' merges several sources; offset and limit are not supported",
                self.name
            )));
        }

        let sources = (0..self.sources.len())
            .map(|index| {
                self.driver(index, Window::all())
                    .map(|driver| Box::new(driver) as Box<dyn RowStream>)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(
            OrderedMerge::new(self.name.clone(), sources, plan.keys.clone())
                .with_decache(plan.decache),
        ))
    }

    /// Engine-facing data source over [`Report::stream`].
    pub fn data_source(
        &self,
        window: Window,
    ) -> Result<DataSource<Box<dyn RowStream>>, ConfigError> {
        Ok(DataSource::new(self.stream(window)?).with_progress_every(self.progress_interval))
    }
}

fn entity_models(
    entities: &[EntitySection],
) -> Result<BTreeMap<String, Arc<EntityModel>>, ConfigError> {
    let mut models = BTreeMap::new();

    for entity in entities {
        let mut model = EntityModel::new(entity.name.clone());
        for field in &entity.fields {
            model = model.with_field(field.name.clone(), field_kind(field.kind));
        }
        if let Some(container) = &entity.extended_attributes {
            model = model.with_extended_attributes(container.clone());
        }

        if models.insert(entity.name.clone(), Arc::new(model)).is_some() {
            return Err(ConfigError::invalid(format!(
                "entity '{}' is declared twice",
                entity.name
            )));
        }
    }

    Ok(models)
}

fn build_source(
    report: &str,
    source: &SourceSection,
    models: &BTreeMap<String, Arc<EntityModel>>,
    registry: &RenderRegistry,
) -> Result<ReportSource, ConfigError> {
    // undeclared entities get an open model
    let model = models
        .get(&source.entity)
        .cloned()
        .unwrap_or_else(|| Arc::new(EntityModel::new(source.entity.clone())));

    let mut query = QuerySpec::new(source.entity.clone()).filter(clauses(&source.filter)?);
    for term in &source.order {
        query = query.order_by(order_term(term));
    }
    for path in &source.group_by {
        query = query.group_by(path.clone());
    }

    let columns = source.columns.iter().map(column).collect();
    let name = source.name.clone().unwrap_or_else(|| report.to_string());
    let mut definition = ReportDefinition::new(name, model, query, columns, registry)?;

    if !source.sub_query_order.is_empty() {
        definition =
            definition.with_sub_query_order(source.sub_query_order.iter().map(order_term).collect());
    }

    if let Some(label) = &source.progress_label {
        if !definition.fields().contains(label) {
            return Err(ConfigError::invalid(format!(
                "progress label '{label}' is not an output field of '{}'",
                definition.name()
            )));
        }
        let label = label.clone();
        definition = definition.with_progress_label(move |row| {
            row.get(&label).map(ToString::to_string).unwrap_or_default()
        });
    }

    let row_filter = if source.row_filter.is_empty() {
        None
    } else {
        Some(clauses(&source.row_filter)?)
    };

    Ok(ReportSource {
        definition: Arc::new(definition),
        row_filter,
    })
}

fn column(section: &ColumnSection) -> ColumnConfig {
    ColumnConfig {
        field: section.field.clone(),
        property: section.property.clone(),
        if_empty_property: section.if_empty.clone(),
        sub_query_key: section.sub_query.clone(),
        script_arguments: section.args.clone(),
        render: section
            .render
            .clone()
            .map(|renderer| RenderDefinition { renderer }),
        best_effort: section.best_effort,
    }
}

fn merge_plan(section: &MergeSection, sources: &[ReportSource]) -> Result<MergePlan, ConfigError> {
    if section.order.is_empty() {
        return Err(ConfigError::invalid("[merge] order needs at least one key"));
    }

    let keys: Vec<SortKey> = section
        .order
        .iter()
        .map(|term| SortKey {
            field: term.path.clone(),
            direction: direction(term.direction),
        })
        .collect();

    for source in sources {
        let definition = &source.definition;
        if let Some(key) = keys
            .iter()
            .find(|key| !definition.fields().contains(&key.field))
        {
            return Err(ConfigError::invalid(format!(
                "merge key '{}' is not an output field of source '{}'",
                key.field,
                definition.name()
            )));
        }
    }

    Ok(MergePlan {
        keys,
        decache: decache_policy(section.decache_interval),
    })
}

fn clauses(sections: &[ClauseSection]) -> Result<Predicate, ConfigError> {
    let predicates = sections
        .iter()
        .map(clause)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Predicate::and(predicates))
}

fn clause(section: &ClauseSection) -> Result<Predicate, ConfigError> {
    let field = section.field.clone();
    let op = match section.op {
        ClauseOp::IsNull => return Ok(Predicate::is_null(field)),
        ClauseOp::IsNotNull => return Ok(Predicate::is_not_null(field)),
        ClauseOp::IsEmpty => return Ok(Predicate::IsEmpty { field }),
        ClauseOp::Eq => CompareOp::Eq,
        ClauseOp::Ne => CompareOp::Ne,
        ClauseOp::Lt => CompareOp::Lt,
        ClauseOp::Lte => CompareOp::Lte,
        ClauseOp::Gt => CompareOp::Gt,
        ClauseOp::Gte => CompareOp::Gte,
        ClauseOp::In => CompareOp::In,
        ClauseOp::NotIn => CompareOp::NotIn,
        ClauseOp::Contains => CompareOp::Contains,
        ClauseOp::StartsWith => CompareOp::StartsWith,
        ClauseOp::EndsWith => CompareOp::EndsWith,
    };

    let Some(value) = section.value.clone() else {
        return Err(ConfigError::invalid(format!(
            "filter on '{field}' with '{}' needs a value",
            op.symbol()
        )));
    };
    if matches!(op, CompareOp::In | CompareOp::NotIn) && !matches!(value, Value::List(_)) {
        return Err(ConfigError::invalid(format!(
            "filter on '{field}' with '{}' needs a list value",
            op.symbol()
        )));
    }

    Ok(Predicate::compare(field, op, value))
}

fn order_term(section: &OrderSection) -> OrderTerm {
    match section.direction {
        DirectionSetting::Asc => OrderTerm::asc(section.path.clone()),
        DirectionSetting::Desc => OrderTerm::desc(section.path.clone()),
    }
}

const fn direction(setting: DirectionSetting) -> Direction {
    match setting {
        DirectionSetting::Asc => Direction::Asc,
        DirectionSetting::Desc => Direction::Desc,
    }
}

const fn field_kind(setting: FieldKindSetting) -> FieldKind {
    match setting {
        FieldKindSetting::Scalar => FieldKind::Scalar,
        FieldKindSetting::Reference => FieldKind::Reference,
        FieldKindSetting::Attributes => FieldKind::Attributes,
    }
}

/// 0 disables decaching, 1 decaches after every row.
const fn decache_policy(interval: u64) -> DecachePolicy {
    match interval {
        0 => DecachePolicy::Never,
        1 => DecachePolicy::EveryRow,
        interval => DecachePolicy::Every(interval),
    }
}
