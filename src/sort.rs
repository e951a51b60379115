use std::cmp::Ordering;
use std::fmt;

use rayon::prelude::*;
use tracing::trace;

use crate::column::ColumnRegistry;
use crate::value::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// Flips the comparator result for descending order.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

/// The canonical sort, shared by grid and card list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpecification {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpecification {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

impl fmt::Display for SortSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

// Precomputed per row so the comparator never resolves values.
struct SortKey {
    number: Option<f64>,
    text: String,
}

impl SortKey {
    fn of(value: Value) -> Self {
        Self {
            number: value.as_number(),
            text: value.to_string().to_lowercase(),
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self.number, other.number) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => locale_compare(&self.text, &other.text),
        }
    }
}

/// Orders row indices by one column of a registry.
pub struct SortEngine<'a, R> {
    registry: &'a ColumnRegistry<R>,
}

impl<'a, R: Row> SortEngine<'a, R> {
    pub fn new(registry: &'a ColumnRegistry<R>) -> Self {
        Self { registry }
    }

    /// Returns a newly ordered copy of `indices`. Without a specification,
    /// or for a field that is not a sortable column, the input order is
    /// kept. Rows with equal keys keep their relative order in both
    /// directions.
    pub fn sort(
        &self,
        dataset: &[R],
        indices: &[usize],
        spec: Option<&SortSpecification>,
    ) -> Vec<usize> {
        let Some(spec) = spec else {
            return indices.to_vec();
        };
        let Some(column) = self
            .registry
            .column(&spec.field)
            .filter(|c| c.is_sortable())
        else {
            trace!("Keeping order, \"{}\" is not a sortable column", spec.field);
            return indices.to_vec();
        };

        let mut keyed: Vec<(usize, SortKey)> = indices
            .par_iter()
            .map(|&idx| (idx, SortKey::of(self.registry.resolve_value(column, &dataset[idx]))))
            .collect();

        // par_sort_by is a stable merge sort
        keyed.par_sort_by(|(_, a), (_, b)| spec.direction.apply(a.compare(b)));
        trace!("Sorted {} rows by {}", keyed.len(), spec);

        keyed.into_iter().map(|(idx, _)| idx).collect()
    }
}

/// Compares two already case-folded strings. Accented latin letters sort
/// with their base letter; the exact strings only decide between otherwise
/// equal keys.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(base_letter)
        .cmp(b.chars().map(base_letter))
        .then_with(|| a.cmp(b))
}

fn base_letter(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'ł' => 'l',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'ś' | 'š' => 's',
        'ť' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        _ => c,
    }
}
