use rayon::prelude::*;
use tracing::trace;

use crate::column::ColumnRegistry;
use crate::value::Row;

/// Trimmed, case-folded form of a free-text query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Free-text matching over every filterable column of a registry.
pub struct FilterEngine<'a, R> {
    registry: &'a ColumnRegistry<R>,
}

impl<'a, R: Row> FilterEngine<'a, R> {
    pub fn new(registry: &'a ColumnRegistry<R>) -> Self {
        Self { registry }
    }

    /// True if any filterable column contains `query` (case insensitive).
    /// A blank query matches every row.
    pub fn matches(&self, row: &R, query: &str) -> bool {
        self.matches_normalized(row, &normalize_query(query))
    }

    /// Dataset indices of all matching rows, in dataset order.
    pub fn filter(&self, dataset: &[R], query: &str) -> Vec<usize> {
        let needle = normalize_query(query);
        if needle.is_empty() {
            return (0..dataset.len()).collect();
        }

        let matches: Vec<usize> = dataset
            .par_iter()
            .enumerate()
            .filter(|(_, row)| self.matches_normalized(row, &needle))
            .map(|(idx, _)| idx)
            .collect();
        trace!("Filter \"{}\" matched {}/{} rows", needle, matches.len(), dataset.len());
        matches
    }

    fn matches_normalized(&self, row: &R, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.registry
            .columns()
            .iter()
            .filter(|c| c.is_filterable())
            .any(|c| {
                self.registry
                    .resolve_value(c, row)
                    .to_string()
                    .to_lowercase()
                    .contains(needle)
            })
    }
}
