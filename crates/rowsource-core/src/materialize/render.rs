//! Named value renderers.
//!
//! Columns refer to renderers by name; names are resolved once when a report
//! definition is built, so an unknown renderer is a configuration error and
//! never a per-row failure.

use crate::{error::InternalError, value::Value};
use std::{collections::BTreeMap, fmt, sync::Arc};
use time::OffsetDateTime;

/// Script arguments keyed by the property path that produced them.
pub type RenderArgs = BTreeMap<String, Value>;

///
/// ValueRenderer
///

pub trait ValueRenderer: Send + Sync {
    fn render(&self, value: Value, args: &RenderArgs) -> Result<Value, InternalError>;
}

impl<F> ValueRenderer for F
where
    F: Fn(Value, &RenderArgs) -> Result<Value, InternalError> + Send + Sync,
{
    fn render(&self, value: Value, args: &RenderArgs) -> Result<Value, InternalError> {
        self(value, args)
    }
}

///
/// RenderRegistry
///

#[derive(Clone, Default)]
pub struct RenderRegistry {
    renderers: BTreeMap<String, Arc<dyn ValueRenderer>>,
}

impl RenderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in renderers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("text", render_text);
        registry.register("upper", render_upper);
        registry.register("lower", render_lower);
        registry.register("trim", render_trim);
        registry.register("join", render_join);
        registry.register("count", render_count);
        registry.register("date", render_date);
        registry.register("coalesce", render_coalesce);
        registry
    }

    /// Register (or replace) one renderer.
    pub fn register<R>(&mut self, name: impl Into<String>, renderer: R)
    where
        R: ValueRenderer + 'static,
    {
        self.renderers.insert(name.into(), Arc::new(renderer));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ValueRenderer>> {
        self.renderers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }
}

impl fmt::Debug for RenderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

fn text_or_null(text: String) -> Value {
    if text.is_empty() {
        Value::Null
    } else {
        Value::Text(text)
    }
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Text(text) => Value::Text(f(&text)),
        other => other,
    }
}

fn render_text(value: Value, _: &RenderArgs) -> Result<Value, InternalError> {
    Ok(text_or_null(value.to_string()))
}

fn render_upper(value: Value, _: &RenderArgs) -> Result<Value, InternalError> {
    Ok(map_text(value, str::to_uppercase))
}

fn render_lower(value: Value, _: &RenderArgs) -> Result<Value, InternalError> {
    Ok(map_text(value, str::to_lowercase))
}

fn render_trim(value: Value, _: &RenderArgs) -> Result<Value, InternalError> {
    Ok(map_text(value, |text| text.trim().to_string()))
}

// List values become one comma-separated text value.
fn render_join(value: Value, _: &RenderArgs) -> Result<Value, InternalError> {
    Ok(match value {
        Value::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter(|item| !item.is_null())
                .map(ToString::to_string)
                .collect();
            text_or_null(parts.join(", "))
        }
        other => other,
    })
}

fn render_count(value: Value, _: &RenderArgs) -> Result<Value, InternalError> {
    let count = match &value {
        Value::Null => 0,
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        _ => 1,
    };

    i64::try_from(count)
        .map(Value::Int)
        .map_err(|_| InternalError::render("count overflows i64"))
}

// Calendar date (UTC) of an epoch-seconds value.
fn render_date(value: Value, _: &RenderArgs) -> Result<Value, InternalError> {
    let seconds = match value {
        Value::Timestamp(seconds) | Value::Int(seconds) => seconds,
        Value::Null => return Ok(Value::Null),
        other => {
            return Err(InternalError::render(format!(
                "date renderer expects a timestamp, found {other:?}"
            )));
        }
    };
    let moment = OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|err| InternalError::render(format!("timestamp {seconds} out of range: {err}")))?;

    Ok(Value::Text(moment.date().to_string()))
}

// Primary value unless blank, else the first non-blank argument.
fn render_coalesce(value: Value, args: &RenderArgs) -> Result<Value, InternalError> {
    if !value.is_blank() {
        return Ok(value);
    }

    Ok(args
        .values()
        .find(|arg| !arg.is_blank())
        .cloned()
        .unwrap_or_default())
}
