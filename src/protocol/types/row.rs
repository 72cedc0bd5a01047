//! Row type for query results.

use std::sync::Arc;

use super::translator::FieldInfo;
use super::value::MaxDbValue;

/// A row of query results.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<MaxDbValue>,
    /// Column descriptions shared by every row of a result.
    columns: Arc<[FieldInfo]>,
}

impl Row {
    pub fn new(values: Vec<MaxDbValue>, columns: Arc<[FieldInfo]>) -> Self {
        Self { values, columns }
    }

    /// Get value by column index (0-based).
    pub fn get(&self, index: usize) -> Option<&MaxDbValue> {
        self.values.get(index)
    }

    /// Get value by column name (case-insensitive).
    pub fn get_by_name(&self, name: &str) -> Option<&MaxDbValue> {
        self.columns
            .iter()
            .position(|c| c.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .and_then(|idx| self.values.get(idx))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[MaxDbValue] {
        &self.values
    }

    pub fn columns(&self) -> &[FieldInfo] {
        &self.columns
    }

    /// Column names; unnamed columns yield an empty string.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_deref().unwrap_or(""))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaxDbValue> {
        self.values.iter()
    }
}

impl IntoIterator for Row {
    type Item = MaxDbValue;
    type IntoIter = std::vec::IntoIter<MaxDbValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a MaxDbValue;
    type IntoIter = std::slice::Iter<'a, MaxDbValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
