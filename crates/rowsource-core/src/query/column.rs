use crate::error::InternalError;

///
/// RenderDefinition
///
/// Names a registered value renderer applied after extraction.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderDefinition {
    pub renderer: String,
}

///
/// ColumnConfig
///
/// Maps one output field to its source property, with optional fallback,
/// sub-query correlation, and value rendering. Immutable once a report
/// definition is built.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnConfig {
    pub field: String,
    pub property: Option<String>,
    pub if_empty_property: Option<String>,
    /// When set, `property` is read through a correlated secondary query keyed
    /// by this path instead of being projected.
    pub sub_query_key: Option<String>,
    /// Extra properties fetched only to feed the renderer.
    pub script_arguments: Vec<String>,
    pub render: Option<RenderDefinition>,
    /// Sub-query and render failures yield Null instead of failing the row.
    pub best_effort: bool,
}

impl ColumnConfig {
    pub fn new(field: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            property: Some(property.into()),
            ..Self::default()
        }
    }

    /// A column computed only by its renderer from script arguments.
    pub fn derived(field: impl Into<String>, renderer: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            render: Some(RenderDefinition {
                renderer: renderer.into(),
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn if_empty(mut self, property: impl Into<String>) -> Self {
        self.if_empty_property = Some(property.into());
        self
    }

    #[must_use]
    pub fn sub_query(mut self, key: impl Into<String>) -> Self {
        self.sub_query_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn script_argument(mut self, property: impl Into<String>) -> Self {
        self.script_arguments.push(property.into());
        self
    }

    #[must_use]
    pub fn render(mut self, renderer: impl Into<String>) -> Self {
        self.render = Some(RenderDefinition {
            renderer: renderer.into(),
        });
        self
    }

    #[must_use]
    pub const fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    /// Check the per-column shape invariants.
    pub fn validate(&self) -> Result<(), InternalError> {
        if self.field.trim().is_empty() {
            return Err(InternalError::planner_input("column field name is empty"));
        }
        if self.sub_query_key.is_some() && self.property.is_none() {
            return Err(InternalError::planner_input(format!(
                "column '{}' has a sub-query key but no property to collect",
                self.field
            )));
        }
        if self.property.is_none() && self.render.is_none() {
            return Err(InternalError::planner_input(format!(
                "column '{}' needs a property or a renderer",
                self.field
            )));
        }
        if self.sub_query_key.is_some() && self.if_empty_property.is_some() {
            return Err(InternalError::planner_input(format!(
                "column '{}' cannot combine a sub-query with a fallback property",
                self.field
            )));
        }

        Ok(())
    }
}
