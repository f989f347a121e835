//! Column specifications and S3 Select query generation.

use rusty_s3access_common::OBJECT_ALIAS;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::filter::{Filter, SimpleFilter};
use crate::path::S3Path;
use crate::value::ColumnType;

/// Ordered mapping of selected column names to their declared types.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnSpec {
    columns: Vec<(String, ColumnType)>,
}

impl ColumnSpec {
    /// Create an empty column list (selects `*`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column at the end. A name that is already present is retyped in
    /// place.
    ///
    /// # Arguments
    /// * `name` - Column name
    /// * `column_type` - Declared type
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        let name: String = name.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = column_type,
            None => self.columns.push((name, column_type)),
        }
        self
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Column types in order.
    pub fn types(&self) -> impl Iterator<Item = ColumnType> + '_ {
        self.columns.iter().map(|(_, column_type)| *column_type)
    }

    /// Name and type pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns
            .iter()
            .map(|(name, column_type)| (name.as_str(), *column_type))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no column was declared.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnType)> for ColumnSpec {
    fn from_iter<I: IntoIterator<Item = (S, ColumnType)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ColumnSpec::new(), |spec, (name, column_type)| {
                spec.with_column(name, column_type)
            })
    }
}

/// A query ready to be sent to S3 Select, with the columns it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Selected columns and their types, in projection order.
    pub columns: ColumnSpec,
    /// S3 Select SQL expression.
    pub query_text: String,
}

impl QueryPlan {
    /// Compile the query for one address.
    ///
    /// Filters on partition keys of `path` are decided locally and left out of
    /// the query text. For glob addresses the query text also serves as the
    /// whole-pattern cache key.
    ///
    /// # Arguments
    /// * `path` - Object address or key pattern
    /// * `columns` - Columns to select
    /// * `filter` - Filter set
    pub fn build(path: &S3Path, columns: &ColumnSpec, filter: &Filter) -> Self {
        let mut query_text: String = projection(columns.names());
        if let Some(predicate) = filter.residual_sql(path, OBJECT_ALIAS) {
            query_text.push_str(" WHERE ");
            query_text.push_str(&predicate);
        }
        Self {
            columns: columns.clone(),
            query_text,
        }
    }
}

fn projection<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let selected: Vec<String> = names
        .map(|name| format!("{}.{}", OBJECT_ALIAS, name))
        .collect();
    let projected: String = if selected.is_empty() {
        "*".to_string()
    } else {
        selected.join(", ")
    };
    format!("SELECT {} FROM S3Object {}", projected, OBJECT_ALIAS)
}

/// Build a query over explicit objects, AND-combining the filters.
///
/// Unlike [`QueryPlan::build`] nothing is checked against partitions: every
/// filter is pushed down.
///
/// # Arguments
/// * `columns` - Column names to select; empty selects `*`
/// * `filters` - Filters to push down
///
/// # Errors
/// Returns `QueryError::InvalidFilterValue` if a filter is invalid.
///
/// # Example
/// ```
/// use rusty_s3access_query::{simple_selection, SimpleFilter};
///
/// let query = simple_selection(
///     &["col1", "col5"],
///     &[
///         SimpleFilter::triple("col1", "=", "some value").unwrap(),
///         SimpleFilter::triple("col5", ">=", 10.2).unwrap(),
///     ],
/// )
/// .unwrap();
/// assert_eq!(
///     query,
///     "SELECT s.col1, s.col5 FROM S3Object s WHERE s.col1 = 'some value' AND s.col5 >= 10.2"
/// );
/// ```
pub fn simple_selection<S: AsRef<str>>(
    columns: &[S],
    filters: &[SimpleFilter],
) -> Result<String, QueryError> {
    let filter: Filter = Filter::from_simple(filters)?;
    let mut query_text: String = projection(columns.iter().map(|c| c.as_ref()));
    // The bucket root has no partitions, so every node stays in the residual.
    let root: S3Path = S3Path::new("", "");
    if let Some(predicate) = filter.residual_sql(&root, OBJECT_ALIAS) {
        query_text.push_str(" WHERE ");
        query_text.push_str(&predicate);
    }
    Ok(query_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Conditionable};

    fn columns() -> ColumnSpec {
        ColumnSpec::new()
            .with_column("country", ColumnType::String)
            .with_column("revenue", ColumnType::Float)
    }

    #[test]
    fn test_projection_without_filters() {
        let path: S3Path = S3Path::parse("s3://bucket/sales/part-0.parquet").unwrap();
        let plan: QueryPlan = QueryPlan::build(&path, &columns(), &Filter::none());
        assert_eq!(plan.query_text, "SELECT s.country, s.revenue FROM S3Object s");
        assert_eq!(plan.columns, columns());
    }

    #[test]
    fn test_select_star_for_no_columns() {
        let path: S3Path = S3Path::parse("s3://bucket/k").unwrap();
        let plan: QueryPlan = QueryPlan::build(&path, &ColumnSpec::new(), &Filter::none());
        assert_eq!(plan.query_text, "SELECT * FROM S3Object s");
    }

    #[test]
    fn test_partition_filters_are_excluded() {
        let filter: Filter = Filter::from_conditions(vec![
            ("country", Conditionable::from("USA")),
            ("revenue", Conditionable::from(Condition::Gt(10.into()))),
        ])
        .unwrap();

        let object: S3Path = S3Path::parse("s3://bucket/sales/country=USA/part-0.parquet").unwrap();
        let plan: QueryPlan = QueryPlan::build(&object, &columns(), &filter);
        assert_eq!(
            plan.query_text,
            "SELECT s.country, s.revenue FROM S3Object s WHERE s.revenue > 10"
        );

        let flat: S3Path = S3Path::parse("s3://bucket/sales/part-0.parquet").unwrap();
        let plan: QueryPlan = QueryPlan::build(&flat, &columns(), &filter);
        assert_eq!(
            plan.query_text,
            "SELECT s.country, s.revenue FROM S3Object s WHERE s.country = 'USA' AND s.revenue > 10"
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let filter: Filter = Filter::from_conditions(vec![("a", 1), ("b", 2)]).unwrap();
        let path: S3Path = S3Path::parse("bucket/x").unwrap();
        assert_eq!(
            QueryPlan::build(&path, &columns(), &filter),
            QueryPlan::build(&path, &columns(), &filter)
        );
    }

    #[test]
    fn test_column_spec_order_and_retype() {
        let spec: ColumnSpec = vec![
            ("b", ColumnType::String),
            ("a", ColumnType::Integer),
            ("b", ColumnType::Float),
        ]
        .into_iter()
        .collect();
        assert_eq!(spec.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(
            spec.types().collect::<Vec<_>>(),
            vec![ColumnType::Float, ColumnType::Integer]
        );
        assert_eq!(spec.len(), 2);
    }

    #[test]
    fn test_simple_selection() {
        assert_eq!(
            simple_selection::<&str>(&[], &[]).unwrap(),
            "SELECT * FROM S3Object s"
        );
        let query: String = simple_selection(
            &["a"],
            &[SimpleFilter::Or(vec![
                SimpleFilter::triple("a", "<", 1).unwrap(),
                SimpleFilter::triple("a", ">", 9).unwrap(),
            ])],
        )
        .unwrap();
        assert_eq!(
            query,
            "SELECT s.a FROM S3Object s WHERE (s.a < 1) OR (s.a > 9)"
        );
    }
}
