//! Module: model
//! Responsibility: entity property declarations and property-path resolution.
//! Does not own: fetching, filtering, or value extraction beyond one container key.
//! Boundary: the planner and materializer resolve every column path through here.


use crate::value::Value;

/// Attribute container root assumed when a model does not declare one.
pub const ATTRIBUTES_ROOT: &str = "attributes";

///
/// FieldKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// Plain scalar property.
    Scalar,
    /// Reference to another entity; nested paths traverse it.
    Reference,
    /// Attribute container; nested paths are keys inside one fetched map.
    Attributes,
}

///
/// FieldModel
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldModel {
    pub name: String,
    pub kind: FieldKind,
}

///
/// EntityModel
///
/// Declared properties of one persistent entity.
///
/// A model with no declared fields is "open": paths resolve directly, except
/// keys under the conventional `attributes` root.
/// When an extended-attribute container is configured, undeclared paths are
/// looked up as keys inside that container instead.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityModel {
    name: String,
    fields: Vec<FieldModel>,
    extended_container: Option<String>,
}

impl EntityModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            extended_container: None,
        }
    }

    /// Declare one property.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        self.fields.retain(|field| field.name != name);
        self.fields.push(FieldModel { name, kind });
        self
    }

    /// Declare the container that holds undeclared (extended) attributes.
    /// The container itself is declared as an `Attributes` field.
    #[must_use]
    pub fn with_extended_attributes(mut self, container: impl Into<String>) -> Self {
        let container = container.into();
        self = self.with_field(container.clone(), FieldKind::Attributes);
        self.extended_container = Some(container);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldModel] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn extended_container(&self) -> Option<&str> {
        self.extended_container.as_deref()
    }

    /// Resolve one dot-separated property path.
    ///
    /// Declared properties win; the extended-attribute container is only
    /// consulted for paths the model does not know. Without one, paths under
    /// [`ATTRIBUTES_ROOT`] are still read as keys of that container.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PropertyAccess {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        if let Some(field) = self.field(head) {
            return match (field.kind, rest) {
                (FieldKind::Attributes, Some(key)) if !key.is_empty() => PropertyAccess::Attribute {
                    container: head.to_string(),
                    key: key.to_string(),
                },
                _ => PropertyAccess::Direct(path.to_string()),
            };
        }

        match (&self.extended_container, rest) {
            (Some(container), _) => PropertyAccess::Attribute {
                container: container.clone(),
                key: path.to_string(),
            },
            (None, Some(key)) if head == ATTRIBUTES_ROOT && !key.is_empty() => {
                PropertyAccess::Attribute {
                    container: head.to_string(),
                    key: key.to_string(),
                }
            }
            (None, _) => PropertyAccess::Direct(path.to_string()),
        }
    }
}

///
/// PropertyAccess
///
/// How one property path is satisfied from a projected row.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PropertyAccess {
    /// The path is fetched as its own projection column.
    Direct(String),
    /// The container is fetched once; the key is extracted per column.
    Attribute { container: String, key: String },
}

impl PropertyAccess {
    /// The projection column that must be fetched to satisfy this access.
    #[must_use]
    pub fn fetch_path(&self) -> &str {
        match self {
            Self::Direct(path) => path,
            Self::Attribute { container, .. } => container,
        }
    }

    /// Fully qualified path, usable in filter criteria.
    #[must_use]
    pub fn full_path(&self) -> String {
        match self {
            Self::Direct(path) => path.clone(),
            Self::Attribute { container, key } => format!("{container}.{key}"),
        }
    }

    /// Derive this property's value from the fetched projection value.
    /// A missing attribute key is an absent value, not an error.
    #[must_use]
    pub fn extract(&self, fetched: &Value) -> Value {
        match self {
            Self::Direct(_) => fetched.clone(),
            Self::Attribute { key, .. } => fetched.get_key(key).cloned().unwrap_or_default(),
        }
    }
}
