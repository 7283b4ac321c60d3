use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::path;
use super::types::{FilterOp, FilterWhereInfo};
use crate::types::Document;

/// Parsed form of a document filter such as
/// `{"from": "0xabc", "amount": {"$gt": 0}, "$or": [...]}`.
#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Nor(Vec<Predicate>),
    Not(Box<Predicate>),
    Field(FilterWhereInfo),
}

impl Predicate {
    pub fn parse(filter: &Document) -> Result<Self, FilterError> {
        let mut clauses = Vec::with_capacity(filter.len());
        for (key, value) in filter {
            if key.starts_with('$') {
                clauses.push(Self::parse_logical_operator(key, value)?);
            } else {
                clauses.extend(Self::parse_field_condition(key, value)?);
            }
        }
        Ok(Predicate::And(clauses))
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Self, FilterError> {
        let items = value
            .as_array()
            .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            let sub = item
                .as_object()
                .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} entries must be objects", op)))?;
            parsed.push(Self::parse(sub)?);
        }
        match op {
            "$and" => Ok(Predicate::And(parsed)),
            "$or" => Ok(Predicate::Or(parsed)),
            "$nor" => Ok(Predicate::Nor(parsed)),
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Self>, FilterError> {
        path::validate(field)?;

        let operators = match value {
            Value::Object(obj) if is_operator_object(obj)? => obj,
            // Implicit equality: { field: value }
            _ => return Ok(vec![Self::field(field, FilterOp::Eq, value.clone())]),
        };

        let mut out = Vec::with_capacity(operators.len());
        for (op_key, op_val) in operators {
            if op_key == "$not" {
                let inner = match op_val {
                    Value::Object(obj) if is_operator_object(obj)? => Self::parse_field_condition(field, op_val)?,
                    _ => return Err(FilterError::InvalidOperatorData("$not requires an operator object".to_string())),
                };
                out.push(Predicate::Not(Box::new(Predicate::And(inner))));
                continue;
            }

            let operator = FilterOp::parse(op_key)?;
            let data = match operator {
                FilterOp::In | FilterOp::NIn if !op_val.is_array() => {
                    return Err(FilterError::InvalidOperatorData(format!("{} requires array", op_key)));
                }
                FilterOp::Exists => Value::Bool(truthy(op_val)),
                _ => op_val.clone(),
            };
            out.push(Self::field(field, operator, data));
        }
        Ok(out)
    }

    fn field(path: &str, operator: FilterOp, data: Value) -> Self {
        Predicate::Field(FilterWhereInfo { path: path.to_string(), operator, data })
    }

    /// Evaluates the predicate against an in-memory document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::And(items) => items.iter().all(|p| p.matches(doc)),
            Predicate::Or(items) => items.iter().any(|p| p.matches(doc)),
            Predicate::Nor(items) => !items.iter().any(|p| p.matches(doc)),
            Predicate::Not(inner) => !inner.matches(doc),
            Predicate::Field(info) => matches_condition(info, doc),
        }
    }
}

fn is_operator_object(obj: &Document) -> Result<bool, FilterError> {
    let operators = obj.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return Ok(false);
    }
    if operators != obj.len() {
        return Err(FilterError::InvalidWhereClause(
            "cannot mix operators and literal fields".to_string(),
        ));
    }
    Ok(true)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::Null => false,
        _ => true,
    }
}

fn matches_condition(info: &FilterWhereInfo, doc: &Document) -> bool {
    let found = path::lookup(doc, &info.path);
    match info.operator {
        FilterOp::Eq => equals_or_contains(found, &info.data),
        FilterOp::Ne => !equals_or_contains(found, &info.data),
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => match found {
            Some(Value::Array(items)) if !info.data.is_array() => {
                items.iter().any(|item| compares(item, &info.data, info.operator))
            }
            Some(v) => compares(v, &info.data, info.operator),
            None => false,
        },
        FilterOp::In => in_list(found, &info.data),
        FilterOp::NIn => !in_list(found, &info.data),
        FilterOp::Exists => found.is_some() == info.data.as_bool().unwrap_or(true),
    }
}

fn in_list(found: Option<&Value>, candidates: &Value) -> bool {
    candidates
        .as_array()
        .map_or(false, |items| items.iter().any(|c| equals_or_contains(found, c)))
}

fn equals_or_contains(found: Option<&Value>, expected: &Value) -> bool {
    match found {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.iter().any(|i| values_equal(i, expected)),
        Some(v) => values_equal(v, expected),
    }
}

fn compares(left: &Value, right: &Value, op: FilterOp) -> bool {
    let Some(ordering) = compare_same_type(left, right) else {
        return false;
    };
    match op {
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Lte => ordering != Ordering::Greater,
        _ => false,
    }
}

/// Equality where numbers compare by value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Ordering between two values of the same JSON type; `None` across types.
pub fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Renders a predicate as a parametrized WHERE clause over a JSONB `body` column.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn generate(predicate: &Predicate, starting_param_index: usize) -> (String, Vec<Value>) {
        let mut filter_where = Self { param_values: vec![], param_index: starting_param_index };
        let sql = filter_where.build(predicate);
        (sql, filter_where.param_values)
    }

    fn build(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::And(items) => self.join(items, " AND ", "TRUE"),
            Predicate::Or(items) => self.join(items, " OR ", "FALSE"),
            Predicate::Nor(items) => format!("NOT COALESCE({}, FALSE)", self.join(items, " OR ", "FALSE")),
            Predicate::Not(inner) => format!("NOT COALESCE({}, FALSE)", self.build(inner)),
            Predicate::Field(info) => self.build_sql_condition(info),
        }
    }

    fn join(&mut self, items: &[Predicate], joiner: &str, empty: &str) -> String {
        if items.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = items.iter().map(|p| format!("({})", self.build(p))).collect();
        format!("({})", parts.join(joiner))
    }

    fn build_sql_condition(&mut self, info: &FilterWhereInfo) -> String {
        let column = json_path(&info.path);
        match info.operator {
            FilterOp::Eq => self.equality(&column, &info.data),
            FilterOp::Ne => format!("NOT COALESCE({}, FALSE)", self.equality(&column, &info.data)),
            FilterOp::Gt => self.comparison(&column, ">", &info.data),
            FilterOp::Gte => self.comparison(&column, ">=", &info.data),
            FilterOp::Lt => self.comparison(&column, "<", &info.data),
            FilterOp::Lte => self.comparison(&column, "<=", &info.data),
            FilterOp::In => self.membership(&column, &info.data),
            FilterOp::NIn => format!("NOT COALESCE({}, FALSE)", self.membership(&column, &info.data)),
            FilterOp::Exists => {
                if info.data.as_bool().unwrap_or(true) {
                    format!("{} IS NOT NULL", column)
                } else {
                    format!("{} IS NULL", column)
                }
            }
        }
    }

    fn equality(&mut self, column: &str, data: &Value) -> String {
        if data.is_null() {
            return format!("({} IS NULL OR {} = 'null'::jsonb)", column, column);
        }
        let p = self.param(data.clone());
        if data.is_array() {
            format!("{} = {}", column, p)
        } else {
            format!(
                "({} = {} OR (jsonb_typeof({}) = 'array' AND {} @> jsonb_build_array({})))",
                column, p, column, column, p
            )
        }
    }

    fn comparison(&mut self, column: &str, sql_op: &str, data: &Value) -> String {
        let p = self.param(data.clone());
        format!("(jsonb_typeof({}) = jsonb_typeof({}) AND {} {} {})", column, p, column, sql_op, p)
    }

    fn membership(&mut self, column: &str, data: &Value) -> String {
        let values = match data {
            Value::Array(values) if !values.is_empty() => values,
            _ => return "FALSE".to_string(),
        };
        let parts: Vec<String> = values.iter().map(|v| self.equality(column, v)).collect();
        format!("({})", parts.join(" OR "))
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}::jsonb", self.param_index)
    }
}

/// `body #> '{"a","b"}'` for the dotted path `a.b`
pub fn json_path(path: &str) -> String {
    format!("(body #> {})", path_literal(path))
}

/// Same as `json_path` but extracts the value as text
pub fn json_text_path(path: &str) -> String {
    format!("(body #>> {})", path_literal(path))
}

fn path_literal(path: &str) -> String {
    let segments: Vec<String> = path
        .split('.')
        .map(|s| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("'{{{}}}'", segments.join(",").replace('\'', "''"))
}
