//! Query request shape: `{select, where, orderBy, limit, skip}`.

use docgraph_store::{is_glob, Filter, GlobPattern, Predicate};
use serde_json::{Map, Value};

use crate::order::OrderBy;
use crate::selector::Selector;
use crate::{QueryError, QueryResult};

/// Filtering, ordering and pagination applied to one collection fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionScope {
    pub filter: Filter,
    pub order_by: OrderBy,
    /// `None` means unlimited.
    pub limit: Option<usize>,
    pub skip: usize,
}

impl CollectionScope {
    /// Reads `where`, `orderBy`, `limit` and `skip` from a request or
    /// `many_ref` object. Missing keys keep their defaults.
    pub fn from_object(object: &Map<String, Value>) -> QueryResult<Self> {
        let mut scope = Self::default();
        if let Some(clause) = object.get("where") {
            scope.filter = parse_where(clause)?;
        }
        if let Some(order) = object.get("orderBy") {
            scope.order_by = OrderBy::from_value(order)?;
        }
        if let Some(limit) = object.get("limit") {
            scope.limit = parse_count("limit", limit)?.filter(|limit| *limit > 0);
        }
        if let Some(skip) = object.get("skip") {
            scope.skip = parse_count("skip", skip)?.unwrap_or(0);
        }
        Ok(scope)
    }

    /// Applies `skip` then `limit` to an already filtered and sorted list.
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        let page = items.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        }
    }
}

/// A parsed read request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// `None` means full data.
    pub select: Option<Selector>,
    pub scope: CollectionScope,
}

impl QueryRequest {
    /// Request for every field of every document.
    pub fn full() -> Self {
        Self::default()
    }

    /// Request with only a selector.
    pub fn select(selector: Selector) -> Self {
        Self {
            select: Some(selector),
            scope: CollectionScope::default(),
        }
    }

    /// Parses the JSON request shape. `null` is the empty request.
    pub fn from_value(value: &Value) -> QueryResult<Self> {
        Self::from_value_with(value, &Selector::parse)
    }

    /// Parses a request serialized as a JSON string, as carried in a `q` parameter.
    pub fn from_json(raw: &str) -> QueryResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| QueryError::bad_selector(raw, format!("invalid JSON: {err}")))?;
        Self::from_value(&value)
    }

    pub(crate) fn from_value_with<F>(value: &Value, parse: &F) -> QueryResult<Self>
    where
        F: Fn(&str) -> QueryResult<Selector>,
    {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(QueryError::bad_selector(
                    other.to_string(),
                    "query must be an object",
                ))
            }
        };
        let select = match object.get("select") {
            None | Some(Value::Null) => None,
            Some(select) => Some(Selector::from_value_with(select, parse)?),
        };
        Ok(Self {
            select,
            scope: CollectionScope::from_object(object)?,
        })
    }
}

/// Translates a `where` object into a filter.
///
/// Scalar values become equality tests, strings with glob metacharacters
/// become pattern tests, and `{"in": [...]}` becomes a membership test.
pub fn parse_where(clause: &Value) -> QueryResult<Filter> {
    let object = match clause {
        Value::Null => return Ok(Filter::all()),
        Value::Object(object) => object,
        other => {
            return Err(QueryError::bad_selector(
                other.to_string(),
                "where must be an object",
            ))
        }
    };

    let mut filter = Filter::all();
    for (field, value) in object {
        let predicate = match value {
            Value::String(raw) if is_glob(raw) => Predicate::Glob(GlobPattern::new(raw)?),
            Value::Object(operator) => parse_operator(field, operator)?,
            other => Predicate::Eq(other.clone()),
        };
        filter.push(field.clone(), predicate);
    }
    Ok(filter)
}

fn parse_operator(field: &str, operator: &Map<String, Value>) -> QueryResult<Predicate> {
    let mut entries = operator.iter();
    match (entries.next(), entries.next()) {
        (Some((name, Value::Array(values))), None) if name == "in" || name == "$in" => {
            Ok(Predicate::In(values.clone()))
        }
        _ => Err(QueryError::bad_selector(
            format!("{field}: {}", Value::Object(operator.clone())),
            "unsupported where operator, expected {\"in\": [...]}",
        )),
    }
}

fn parse_count(name: &str, value: &Value) -> QueryResult<Option<usize>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                QueryError::bad_selector(
                    value.to_string(),
                    format!("{name} must be a non-negative integer"),
                )
            }),
        other => Err(QueryError::bad_selector(
            other.to_string(),
            format!("{name} must be a non-negative integer"),
        )),
    }
}
