use crate::{
    error::{FieldError, InternalError},
    query::Row,
    value::Value,
};
use derive_more::Deref;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

///
/// RawRow
///
/// Positional tuple returned by a projection query.
/// Position `i` corresponds to projection column `i`.
///

#[derive(Clone, Debug, Default, Deref, PartialEq)]
pub struct RawRow(pub Vec<Value>);

impl From<Vec<Value>> for RawRow {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

///
/// RowLayout
///
/// Shared field-name → position index for every row of one column set.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowLayout {
    fields: Vec<String>,
    index: HashMap<String, usize>,
}

impl RowLayout {
    pub fn new(fields: Vec<String>) -> Result<Self, InternalError> {
        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if index.insert(field.clone(), position).is_some() {
                return Err(InternalError::planner_input(format!(
                    "duplicate output field '{field}'"
                )));
            }
        }

        Ok(Self { fields, index })
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn position(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

///
/// MaterializedRow
///
/// Named-field record built from one raw row. Read-only once built; every
/// field of the layout is present (possibly Null).
///

#[derive(Clone, Debug)]
pub struct MaterializedRow {
    layout: Arc<RowLayout>,
    values: Vec<Value>,
}

impl MaterializedRow {
    pub fn new(layout: Arc<RowLayout>, values: Vec<Value>) -> Result<Self, InternalError> {
        if layout.len() != values.len() {
            return Err(InternalError::driver_invariant(format!(
                "row has {} values for {} fields",
                values.len(),
                layout.len()
            )));
        }

        Ok(Self { layout, values })
    }

    /// Build a row with its own layout from ordered `(field, value)` pairs.
    pub fn from_pairs<K, I>(pairs: I) -> Result<Self, InternalError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let (fields, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();

        Self::new(Arc::new(RowLayout::new(fields)?), values)
    }

    /// Read one field. Unknown names are caller-input errors.
    pub fn get(&self, field: &str) -> Result<&Value, FieldError> {
        self.layout
            .position(field)
            .map(|position| &self.values[position])
            .ok_or_else(|| FieldError::unknown(field))
    }

    #[must_use]
    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        self.layout.fields()
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.layout
            .fields()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.iter()
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect()
    }
}

impl PartialEq for MaterializedRow {
    fn eq(&self, other: &Self) -> bool {
        self.fields() == other.fields() && self.values == other.values
    }
}

impl Row for MaterializedRow {
    fn value_at(&self, path: &str) -> Option<&Value> {
        self.get(path).ok()
    }
}

impl Serialize for MaterializedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}
