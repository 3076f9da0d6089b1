use crate::value::{Value, strict_order_cmp, values_equal};
use std::fmt;

///
/// Predicate AST
///
/// Schema-agnostic filter criteria. Sessions translate these into their own
/// query language; the in-memory session and residual row filters evaluate
/// them directly through [`Row`].
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Contains => "contains",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
        }
    }
}

///
/// ComparePredicate
///

#[derive(Clone, Debug, PartialEq)]
pub struct ComparePredicate {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl ComparePredicate {
    fn matches(&self, actual: &Value) -> bool {
        match self.op {
            CompareOp::Eq => values_equal(actual, &self.value),
            CompareOp::Ne => !values_equal(actual, &self.value),
            CompareOp::Lt => strict_order_cmp(actual, &self.value).is_some_and(|o| o.is_lt()),
            CompareOp::Lte => strict_order_cmp(actual, &self.value).is_some_and(|o| o.is_le()),
            CompareOp::Gt => strict_order_cmp(actual, &self.value).is_some_and(|o| o.is_gt()),
            CompareOp::Gte => strict_order_cmp(actual, &self.value).is_some_and(|o| o.is_ge()),
            CompareOp::In => self.in_list(actual),
            CompareOp::NotIn => !self.in_list(actual),
            CompareOp::Contains => match (actual, &self.value) {
                (Value::Text(text), Value::Text(needle)) => text.contains(needle.as_str()),
                (Value::List(items), needle) => items.iter().any(|item| values_equal(item, needle)),
                (Value::Map(map), Value::Text(key)) => map.contains_key(key),
                _ => false,
            },
            CompareOp::StartsWith => match (actual, &self.value) {
                (Value::Text(text), Value::Text(prefix)) => text.starts_with(prefix.as_str()),
                _ => false,
            },
            CompareOp::EndsWith => match (actual, &self.value) {
                (Value::Text(text), Value::Text(suffix)) => text.ends_with(suffix.as_str()),
                _ => false,
            },
        }
    }

    fn in_list(&self, actual: &Value) -> bool {
        match &self.value {
            Value::List(items) => items.iter().any(|item| values_equal(actual, item)),
            other => values_equal(actual, other),
        }
    }
}

///
/// Predicate
///

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Predicate {
    #[default]
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
    IsNull {
        field: String,
    },
    IsNotNull {
        field: String,
    },
    /// Null, blank text, or an empty list/map.
    IsEmpty {
        field: String,
    },
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn in_(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::compare(field, CompareOp::In, Value::List(values))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::IsNotNull {
            field: field.into(),
        }
    }

    /// Conjunction that collapses trivial shapes.
    #[must_use]
    pub fn and(mut predicates: Vec<Self>) -> Self {
        predicates.retain(|predicate| *predicate != Self::True);
        match predicates.len() {
            0 => Self::True,
            1 => predicates.pop().unwrap_or(Self::True),
            _ => Self::And(predicates),
        }
    }

    /// Disjunction that collapses trivial shapes.
    #[must_use]
    pub fn or(mut predicates: Vec<Self>) -> Self {
        predicates.retain(|predicate| *predicate != Self::False);
        match predicates.len() {
            0 => Self::False,
            1 => predicates.pop().unwrap_or(Self::False),
            _ => Self::Or(predicates),
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate against one row. Missing fields read as Null.
    pub fn evaluate<R: Row + ?Sized>(&self, row: &R) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::And(children) => children.iter().all(|child| child.evaluate(row)),
            Self::Or(children) => children.iter().any(|child| child.evaluate(row)),
            Self::Not(inner) => !inner.evaluate(row),
            Self::Compare(cmp) => cmp.matches(row.value_at(&cmp.field).unwrap_or(&Value::Null)),
            Self::IsNull { field } => row.value_at(field).is_none_or(Value::is_null),
            Self::IsNotNull { field } => row.value_at(field).is_some_and(|v| !v.is_null()),
            Self::IsEmpty { field } => row.value_at(field).is_none_or(|value| match value {
                Value::List(items) => items.is_empty(),
                Value::Map(map) => map.is_empty(),
                other => other.is_blank(),
            }),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (idx, child) in children.iter().enumerate() {
                if idx > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::And(children) => join(f, children, " and "),
            Self::Or(children) => join(f, children, " or "),
            Self::Not(inner) => write!(f, "not {inner}"),
            Self::Compare(cmp) => write!(f, "{} {} {:?}", cmp.field, cmp.op.symbol(), cmp.value),
            Self::IsNull { field } => write!(f, "{field} is null"),
            Self::IsNotNull { field } => write!(f, "{field} is not null"),
            Self::IsEmpty { field } => write!(f, "{field} is empty"),
        }
    }
}

///
/// Row
///
/// Anything predicates can read fields from.
/// `None` means the field is missing; it is evaluated as Null.
///

pub trait Row {
    fn value_at(&self, path: &str) -> Option<&Value>;
}
