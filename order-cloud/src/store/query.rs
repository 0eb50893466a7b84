//! Filtered, ordered queries over JSON documents
//!
//! redb has no secondary indexes, so a query is a full scan of one table with
//! the filters applied in memory. Collections here are per-chain operational
//! data (hundreds to low thousands of documents), which keeps scans cheap.

use std::cmp::Ordering;

use serde_json::Value;

use super::Collection;

/// Upper sentinel appended to a prefix to build a half-open prefix range
pub const PREFIX_SENTINEL: char = '\u{f8ff}';

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// field >= value
    Gte(String, Value),
    /// field < value
    Lt(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub collection: Collection,
    filters: Vec<Filter>,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    /// `[gte, lt)` range on one field
    pub fn filter_range(
        mut self,
        field: &str,
        gte: impl Into<Value>,
        lt: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter::Gte(field.to_string(), gte.into()));
        self.filters.push(Filter::Lt(field.to_string(), lt.into()));
        self
    }

    /// String prefix as the range `[prefix, prefix + sentinel)`
    pub fn filter_prefix(self, field: &str, prefix: &str) -> Self {
        let upper = format!("{prefix}{PREFIX_SENTINEL}");
        self.filter_range(field, prefix, upper)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document passes every filter
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(field, expected) => lookup(doc, field) == Some(expected),
            Filter::Gte(field, bound) => lookup(doc, field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Less),
            Filter::Lt(field, bound) => lookup(doc, field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord == Ordering::Less),
        })
    }

    /// Sort and truncate already-filtered documents
    ///
    /// Documents missing the order-by field are dropped, matching how
    /// ordered queries behave on document stores.
    pub fn finish(&self, mut docs: Vec<Value>) -> Vec<Value> {
        if let Some((field, direction)) = &self.order_by {
            docs.retain(|d| lookup(d, field).is_some());
            docs.sort_by(|a, b| {
                let ord = match (lookup(a, field), lookup(b, field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Resolve a dotted field path (`address.zipNo`) inside a document
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |cur, key| cur.get(key))
}

/// Order two JSON scalars of the same type; `None` when incomparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Deep-merge `patch` into `target`
///
/// Objects merge key by key; any other value replaces. A `null` in the patch
/// removes the key.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    base.remove(&key);
                } else if let Some(existing) = base.get_mut(&key) {
                    merge_json(existing, value);
                } else {
                    base.insert(key, value);
                }
            }
        }
        (target, patch) => *target = patch,
    }
}
