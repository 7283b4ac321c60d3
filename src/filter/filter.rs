use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{FilterWhere, Predicate};
use super::types::{SortKey, SqlResult};
use crate::types::Document;

/// SQL rendering of a document query against a `(seq, id, body)` table.
pub struct Filter {
    table_name: String,
    predicate: Predicate,
    order_data: Vec<SortKey>,
    limit: Option<u64>,
    offset: u64,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            predicate: Predicate::And(vec![]),
            order_data: vec![],
            limit: None,
            offset: 0,
        })
    }

    pub fn where_clause(&mut self, filter: &Document) -> Result<&mut Self, FilterError> {
        self.predicate = Predicate::parse(filter)?;
        Ok(self)
    }

    pub fn order(&mut self, keys: &[SortKey]) -> &mut Self {
        self.order_data = keys.to_vec();
        self
    }

    pub fn limit(&mut self, limit: Option<u64>, offset: u64) -> &mut Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.predicate, 0);
        let query = [
            "SELECT \"id\", \"body\"".to_string(),
            format!("FROM {}", self.quoted_table()),
            format!("WHERE {}", where_clause),
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    /// Row-locking variant of `to_sql` for read-modify-write inside a transaction.
    pub fn to_locking_sql(&self) -> SqlResult {
        let mut result = self.to_sql();
        result.query.push_str(" FOR UPDATE");
        result
    }

    pub fn to_delete_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.predicate, 0);
        let query = if self.limit.is_some() {
            format!(
                "DELETE FROM {table} WHERE \"id\" IN (SELECT \"id\" FROM {table} WHERE {} {} {})",
                where_clause,
                FilterOrder::generate(&self.order_data),
                self.build_limit_clause(),
                table = self.quoted_table(),
            )
        } else {
            format!("DELETE FROM {} WHERE {}", self.quoted_table(), where_clause)
        };
        SqlResult { query, params }
    }

    pub fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table_name)
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            None => false,
        };
        if !valid {
            return Err(FilterError::InvalidTableName(name.to_string()));
        }
        Ok(())
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), 0) => format!("LIMIT {}", l),
            (Some(l), o) => format!("LIMIT {} OFFSET {}", l, o),
            (None, 0) => String::new(),
            (None, o) => format!("OFFSET {}", o),
        }
    }
}
