use serde::Serialize;
use std::fmt;

/// Text shown when a command runs against the whole inventory
pub const NO_FILTERS_TEXT: &str = "No filters applied";

/// FilterClause is one parsed `--filter` argument.
/// More than one value means the values are OR-ed together for `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterClause {
    pub key: String,
    pub values: Vec<String>,
}

impl FilterClause {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.values.join("|"))
    }
}

/// FilterExpression is an ordered list of clauses combined with AND.
/// An empty expression selects every device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterExpression {
    pub clauses: Vec<FilterClause>,
}

impl FilterExpression {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilterClause> {
        self.clauses.iter()
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::filters::format_expression(self))
    }
}

impl<'a> IntoIterator for &'a FilterExpression {
    type Item = &'a FilterClause;
    type IntoIter = std::slice::Iter<'a, FilterClause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.iter()
    }
}
