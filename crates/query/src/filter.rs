//! Filter sets and their evaluation against partitioned paths.
//!
//! Filters come in two shapes:
//! - a column to [`Condition`] mapping, implicitly AND-combined
//! - a list of `(column, operator, value)` triples, optionally grouped with
//!   [`SimpleFilter::And`] / [`SimpleFilter::Or`]
//!
//! Both are normalized into the same [`Filter`] tree. Evaluating that tree
//! against an [`S3Path`] resolves every node whose column is a partition key
//! locally and leaves a [`Residual`]: the part of the predicate that must be
//! pushed down to S3 Select, or a constant if the partitions alone decide.

use std::fmt;
use std::str::FromStr;

use crate::condition::{make_condition, Condition, Conditionable};
use crate::error::QueryError;
use crate::glob::is_glob;
use crate::path::S3Path;
use crate::value::Value;

/// Comparison operator of a simple filter triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
}

impl Operator {
    /// Canonical S3 Select spelling.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::In => "IN",
        }
    }

    /// Build the condition this operator applies to `value`.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidFilterValue` if `IN` is not given a
    /// non-empty list of scalars, another operator is given a list, or the
    /// value holds a NaN or infinite float.
    pub fn condition(&self, value: Value) -> Result<Condition, QueryError> {
        if !value.has_literal() {
            return Err(QueryError::invalid_filter(format!(
                "operator {} cannot compare against {}",
                self.as_sql(),
                value
            )));
        }
        match (self, value) {
            (Operator::In, list @ Value::List(_)) => make_condition(list),
            (Operator::In, other) => Err(QueryError::invalid_filter(format!(
                "IN expects a list of values, got {}",
                other
            ))),
            (op, list @ Value::List(_)) => Err(QueryError::invalid_filter(format!(
                "operator {} expects a single value, got {}",
                op.as_sql(),
                list
            ))),
            (Operator::Eq, value) => Ok(Condition::Eq(value)),
            (Operator::Neq, value) => Ok(Condition::Neq(value)),
            (Operator::Lt, value) => Ok(Condition::Lt(value)),
            (Operator::Lte, value) => Ok(Condition::Lte(value)),
            (Operator::Gt, value) => Ok(Condition::Gt(value)),
            (Operator::Gte, value) => Ok(Condition::Gte(value)),
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" | "/=" => Ok(Operator::Neq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            op if op.eq_ignore_ascii_case("in") => Ok(Operator::In),
            other => Err(QueryError::invalid_filter(format!(
                "unknown operator {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One element of the list-of-triples filter syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleFilter {
    /// `column <operator> value`
    Triple {
        column: String,
        operator: Operator,
        value: Value,
    },
    And(Vec<SimpleFilter>),
    Or(Vec<SimpleFilter>),
}

impl SimpleFilter {
    /// Build a validated triple.
    ///
    /// # Arguments
    /// * `column` - Column name
    /// * `operator` - Operator spelling, e.g. `=`, `==`, `!=`, `<>`, `/=`, `>=`, `in`
    /// * `value` - Right-hand side
    ///
    /// # Errors
    /// Returns `QueryError::InvalidFilterValue` for unknown operators or values
    /// the operator cannot take.
    pub fn triple(
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, QueryError> {
        let operator: Operator = operator.parse()?;
        let value: Value = value.into();
        operator.condition(value.clone())?;
        Ok(SimpleFilter::Triple {
            column: column.into(),
            operator,
            value,
        })
    }

    fn to_node(&self) -> Result<FilterNode, QueryError> {
        match self {
            SimpleFilter::Triple {
                column,
                operator,
                value,
            } => Ok(FilterNode::Column {
                column: column.clone(),
                condition: operator.condition(value.clone())?,
            }),
            SimpleFilter::And(children) => Ok(FilterNode::All(
                children.iter().map(|c| c.to_node()).collect::<Result<_, _>>()?,
            )),
            SimpleFilter::Or(children) => Ok(FilterNode::Any(
                children.iter().map(|c| c.to_node()).collect::<Result<_, _>>()?,
            )),
        }
    }
}

/// Normalized filter tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// A condition on one column.
    Column { column: String, condition: Condition },
    /// All children hold.
    All(Vec<FilterNode>),
    /// Any child holds.
    Any(Vec<FilterNode>),
}

/// What is left of a filter once partition values are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Residual {
    /// The partitions satisfy the filter; nothing to push down.
    True,
    /// The partitions contradict the filter; the object can be skipped.
    False,
    /// A predicate that must be evaluated remotely.
    Sql {
        text: String,
        /// Whether `text` needs parentheses next to other fragments.
        compound: bool,
    },
}

impl Residual {
    fn wrapped(&self) -> String {
        match self {
            Residual::True => "TRUE".to_string(),
            Residual::False => "FALSE".to_string(),
            Residual::Sql { text, compound } if *compound => format!("({})", text),
            Residual::Sql { text, .. } => text.clone(),
        }
    }

    fn combine(parts: Vec<Residual>, all: bool, top_level: bool) -> Residual {
        let (absorbing, neutral) = if all {
            (Residual::False, Residual::True)
        } else {
            (Residual::True, Residual::False)
        };

        let mut remaining: Vec<Residual> = Vec::with_capacity(parts.len());
        for part in parts {
            if part == absorbing {
                return absorbing;
            }
            if part != neutral {
                remaining.push(part);
            }
        }

        match remaining.len() {
            0 => neutral,
            1 => remaining.remove(0),
            _ => {
                let connective: &str = if all { " AND " } else { " OR " };
                let fragments: Vec<String> = remaining
                    .iter()
                    .map(|r| match r {
                        // Nested groups always parenthesize their members.
                        Residual::Sql { text, .. } if !top_level => format!("({})", text),
                        other => other.wrapped(),
                    })
                    .collect();
                Residual::Sql {
                    text: fragments.join(connective),
                    compound: true,
                }
            }
        }
    }
}

/// A normalized filter set: its top-level nodes are AND-combined.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    nodes: Vec<FilterNode>,
}

impl Filter {
    /// A filter that keeps everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from a column to condition mapping.
    ///
    /// Values are passed through [`make_condition`], so plain scalars mean
    /// equality and lists mean membership.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidFilterValue` if a value cannot be turned into
    /// a condition.
    pub fn from_conditions<I, K, C>(conditions: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<Conditionable>,
    {
        let mut nodes: Vec<FilterNode> = Vec::new();
        for (column, condition) in conditions {
            nodes.push(FilterNode::Column {
                column: column.into(),
                condition: make_condition(condition)?,
            });
        }
        Ok(Self { nodes })
    }

    /// Build from the list-of-triples syntax.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidFilterValue` if a triple is invalid.
    pub fn from_simple(filters: &[SimpleFilter]) -> Result<Self, QueryError> {
        let nodes: Vec<FilterNode> = filters
            .iter()
            .map(|f| f.to_node())
            .collect::<Result<_, _>>()?;
        Ok(Self { nodes })
    }

    /// Whether the filter has no conditions at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes.
    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// Partially evaluate the filter against the partitions of `path`.
    ///
    /// Nodes on partition columns are decided locally. Partition values that
    /// are themselves glob patterns (`country=*`) are not known yet and stay in
    /// the residual.
    ///
    /// # Arguments
    /// * `path` - Object address supplying partition values
    /// * `alias` - Table alias prefixed to remote column references
    pub fn residual(&self, path: &S3Path, alias: &str) -> Residual {
        let parts: Vec<Residual> = self
            .nodes
            .iter()
            .map(|node| evaluate(node, path, alias))
            .collect();
        Residual::combine(parts, true, true)
    }

    /// Local partition check: `false` if the partitions of `path` alone rule
    /// out every row.
    pub fn matches_partitions(&self, path: &S3Path) -> bool {
        self.residual(path, "") != Residual::False
    }

    /// The `WHERE` clause body to push down for `path`, if any.
    ///
    /// # Returns
    /// `None` if the partitions already satisfy the whole filter, `FALSE` if
    /// they contradict it, the remaining predicate otherwise.
    pub fn residual_sql(&self, path: &S3Path, alias: &str) -> Option<String> {
        match self.residual(path, alias) {
            Residual::True => None,
            Residual::False => Some("FALSE".to_string()),
            Residual::Sql { text, .. } => Some(text),
        }
    }
}

fn evaluate(node: &FilterNode, path: &S3Path, alias: &str) -> Residual {
    match node {
        FilterNode::Column { column, condition } => {
            match path.partition(column).filter(|v| !is_glob(v)) {
                Some(value) => {
                    if condition.check(&Value::from(value)) {
                        Residual::True
                    } else {
                        Residual::False
                    }
                }
                None => {
                    let column_ref: String = if alias.is_empty() {
                        column.clone()
                    } else {
                        format!("{}.{}", alias, column)
                    };
                    Residual::Sql {
                        text: condition.compile(&column_ref),
                        compound: condition.is_compound(),
                    }
                }
            }
        }
        FilterNode::All(children) => Residual::combine(
            children.iter().map(|c| evaluate(c, path, alias)).collect(),
            true,
            false,
        ),
        FilterNode::Any(children) => Residual::combine(
            children.iter().map(|c| evaluate(c, path, alias)).collect(),
            false,
            false,
        ),
    }
}
