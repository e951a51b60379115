use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use derive_setters::Setters;
use tracing::{debug, error};

use crate::domain::ConfigError;
use crate::sort::SortSpecification;
use crate::value::{Row, Value};

/// Number of leading compact columns rendered as the card title.
pub const COMPACT_HEADER_FIELDS: usize = 2;

pub type Accessor<R> = Arc<dyn Fn(&R) -> Value + Send + Sync>;
pub type TagColorResolver<R> = Arc<dyn Fn(&Value, &R) -> Option<String> + Send + Sync>;

/// Where a column gets its raw value from.
pub enum ValueAccessor<R> {
    /// Field name or dotted path into nested records, e.g. `address.city`.
    FieldPath(String),
    Accessor(Accessor<R>),
}

impl<R> Clone for ValueAccessor<R> {
    fn clone(&self) -> Self {
        match self {
            ValueAccessor::FieldPath(p) => ValueAccessor::FieldPath(p.clone()),
            ValueAccessor::Accessor(f) => ValueAccessor::Accessor(Arc::clone(f)),
        }
    }
}

impl<R> fmt::Debug for ValueAccessor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueAccessor::FieldPath(p) => f.debug_tuple("FieldPath").field(p).finish(),
            ValueAccessor::Accessor(_) => f.write_str("Accessor(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKind {
    #[default]
    Plain,
    /// Rendered as a colored chip.
    Tag,
    /// Holds the row action buttons, carries no data.
    Actions,
}

#[derive(Setters)]
#[setters(prefix = "with_")]
pub struct ColumnDefinition<R> {
    #[setters(skip)]
    pub key: String,
    #[setters(into)]
    pub header: String,
    #[setters(skip)]
    pub accessor: ValueAccessor<R>,
    pub sortable: bool,
    pub visible_in_compact_mode: bool,
    pub monospace: bool,
    #[setters(skip)]
    pub kind: ColumnKind,
    #[setters(skip)]
    pub tag_color: Option<TagColorResolver<R>>,
}

impl<R> ColumnDefinition<R> {
    /// Plain sortable column reading the field named like its key.
    pub fn new(key: impl Into<String>, header: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            accessor: ValueAccessor::FieldPath(key.clone()),
            key,
            header: header.into(),
            sortable: true,
            visible_in_compact_mode: false,
            monospace: false,
            kind: ColumnKind::Plain,
            tag_color: None,
        }
    }

    /// Column holding the row actions.
    pub fn actions(key: impl Into<String>, header: impl Into<String>) -> Self {
        let mut column = Self::new(key, header);
        column.kind = ColumnKind::Actions;
        column.sortable = false;
        column
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.accessor = ValueAccessor::FieldPath(path.into());
        self
    }

    pub fn with_accessor(mut self, f: impl Fn(&R) -> Value + Send + Sync + 'static) -> Self {
        self.accessor = ValueAccessor::Accessor(Arc::new(f));
        self
    }

    /// Turns the column into a tag column colored by `resolver`.
    pub fn with_tag_color(
        mut self,
        resolver: impl Fn(&Value, &R) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.kind = ColumnKind::Tag;
        self.tag_color = Some(Arc::new(resolver));
        self
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable && self.kind != ColumnKind::Actions
    }

    pub fn is_filterable(&self) -> bool {
        self.kind != ColumnKind::Actions
    }
}

impl<R> fmt::Debug for ColumnDefinition<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDefinition")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("accessor", &self.accessor)
            .field("sortable", &self.sortable)
            .field("visible_in_compact_mode", &self.visible_in_compact_mode)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Ordered, immutable set of columns with unique keys.
#[derive(Debug)]
pub struct ColumnRegistry<R> {
    columns: Vec<ColumnDefinition<R>>,
}

impl<R: Row> ColumnRegistry<R> {
    pub fn new(columns: Vec<ColumnDefinition<R>>) -> Result<Self, ConfigError> {
        if columns.is_empty() {
            error!("Refusing column registry without columns");
            return Err(ConfigError::NoColumns);
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in columns.iter() {
            if !seen.insert(column.key.as_str()) {
                error!("Refusing column registry, duplicate key \"{}\"", column.key);
                return Err(ConfigError::DuplicateColumnKey(column.key.clone()));
            }
        }
        debug!("Column registry with {} columns", columns.len());
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnDefinition<R>] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, key: &str) -> Option<&ColumnDefinition<R>> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Raw value of `column` for `row`. Missing fields anywhere along a
    /// dotted path resolve to `Value::Null`.
    pub fn resolve_value(&self, column: &ColumnDefinition<R>, row: &R) -> Value {
        match &column.accessor {
            ValueAccessor::Accessor(f) => f(row),
            ValueAccessor::FieldPath(path) => resolve_path(row, path)
                .map(Cow::into_owned)
                .unwrap_or(Value::Null),
        }
    }

    /// Color token for a tag cell, `None` for non tag columns.
    pub fn tag_color(&self, column: &ColumnDefinition<R>, row: &R) -> Option<String> {
        if column.kind != ColumnKind::Tag {
            return None;
        }
        let resolver = column.tag_color.as_ref()?;
        resolver(&self.resolve_value(column, row), row)
    }

    pub fn list_filterable_columns(&self) -> Vec<&ColumnDefinition<R>> {
        self.columns.iter().filter(|c| c.is_filterable()).collect()
    }

    pub fn list_sortable_columns(&self) -> Vec<&ColumnDefinition<R>> {
        self.columns.iter().filter(|c| c.is_sortable()).collect()
    }

    pub fn first_sortable_column(&self) -> Option<&ColumnDefinition<R>> {
        self.columns.iter().find(|c| c.is_sortable())
    }

    fn compact_columns(&self) -> impl Iterator<Item = &ColumnDefinition<R>> {
        self.columns
            .iter()
            .filter(|c| c.visible_in_compact_mode && c.kind != ColumnKind::Actions)
    }

    /// Card title fields, mirroring the grid's primary identity columns.
    pub fn compact_header_columns(&self) -> Vec<&ColumnDefinition<R>> {
        self.compact_columns().take(COMPACT_HEADER_FIELDS).collect()
    }

    /// Card detail lines, every compact column except the title fields.
    pub fn compact_detail_columns(&self) -> Vec<&ColumnDefinition<R>> {
        self.compact_columns().skip(COMPACT_HEADER_FIELDS).collect()
    }

    /// Header of the sorted column, or the raw field for unknown keys.
    pub fn sort_label(&self, spec: &SortSpecification) -> String {
        self.column(&spec.field)
            .map(|c| c.header.clone())
            .unwrap_or_else(|| spec.field.clone())
    }
}

fn resolve_path<'a, R: Row>(row: &'a R, path: &str) -> Option<Cow<'a, Value>> {
    let mut segments = path.split('.');
    let mut current = row.field(segments.next()?)?;
    for segment in segments {
        current = match current {
            Cow::Borrowed(v) => Cow::Borrowed(v.get(segment)?),
            Cow::Owned(v) => Cow::Owned(v.get(segment)?.clone()),
        };
    }
    Some(current)
}
