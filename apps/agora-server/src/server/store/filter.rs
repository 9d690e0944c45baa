use std::{
    cmp::Ordering,
    ops::{BitAnd, BitOr},
};

use serde::Serialize;
use serde_json::Value;

/// Boolean predicate over a document's JSON form.
///
/// Paths are split on `.`; `HasKey` carries its key separately so map keys
/// may contain any character.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    All,
    Eq(Vec<String>, Value),
    Ne(Vec<String>, Value),
    Lt(Vec<String>, Value),
    Lte(Vec<String>, Value),
    Gt(Vec<String>, Value),
    Gte(Vec<String>, Value),
    HasKey(Vec<String>, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_owned).collect()
}

// Ids, enums and numbers cannot fail to serialize.
fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Filter {
    pub(crate) fn eq(path: &str, value: impl Serialize) -> Self {
        Self::Eq(split_path(path), to_value(value))
    }

    pub(crate) fn ne(path: &str, value: impl Serialize) -> Self {
        Self::Ne(split_path(path), to_value(value))
    }

    pub(crate) fn lt(path: &str, value: impl Serialize) -> Self {
        Self::Lt(split_path(path), to_value(value))
    }

    pub(crate) fn lte(path: &str, value: impl Serialize) -> Self {
        Self::Lte(split_path(path), to_value(value))
    }

    pub(crate) fn gt(path: &str, value: impl Serialize) -> Self {
        Self::Gt(split_path(path), to_value(value))
    }

    pub(crate) fn gte(path: &str, value: impl Serialize) -> Self {
        Self::Gte(split_path(path), to_value(value))
    }

    pub(crate) fn has_key(path: &str, key: impl Into<String>) -> Self {
        Self::HasKey(split_path(path), key.into())
    }

    pub(crate) fn by_id(id: impl Serialize) -> Self {
        Self::eq("id", id)
    }

    /// Evaluates the predicate against a document already converted to JSON.
    pub(crate) fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Eq(path, expected) => lookup(document, path) == Some(expected),
            Self::Ne(path, expected) => lookup(document, path) != Some(expected),
            Self::Lt(path, bound) => compare_at(document, path, bound) == Some(Ordering::Less),
            Self::Lte(path, bound) => matches!(
                compare_at(document, path, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt(path, bound) => {
                compare_at(document, path, bound) == Some(Ordering::Greater)
            }
            Self::Gte(path, bound) => matches!(
                compare_at(document, path, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::HasKey(path, key) => lookup(document, path)
                .and_then(Value::as_object)
                .is_some_and(|object| object.contains_key(key)),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(document)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(document)),
        }
    }
}

impl BitAnd for Filter {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::All, other) | (other, Self::All) => other,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (other, Self::And(mut right)) => {
                right.insert(0, other);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl BitOr for Filter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FindOptions {
    pub(crate) sort: Vec<(Vec<String>, SortDirection)>,
    pub(crate) limit: Option<usize>,
}

impl FindOptions {
    pub(crate) fn sorted_by(mut self, path: &str, direction: SortDirection) -> Self {
        self.sort.push((split_path(path), direction));
        self
    }

    pub(crate) fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Orders two documents by the configured sort keys. Missing fields sort first.
    pub(crate) fn compare(&self, left: &Value, right: &Value) -> Ordering {
        for (path, direction) in &self.sort {
            let ordering = match (lookup(left, path), lookup(right, path)) {
                (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

pub(crate) fn lookup<'a>(document: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(document, |current, segment| current.get(segment.as_str()))
}

fn compare_at(document: &Value, path: &[String], bound: &Value) -> Option<Ordering> {
    compare_values(lookup(document, path)?, bound)
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
