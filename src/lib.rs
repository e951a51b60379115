//! Adaptive table state: one dataset, one query and one canonical sort,
//! presented either as a paginated grid or as an unpaginated card list.
//!
//! [`AdaptiveTableController`] owns the state and keeps both views derived
//! from it. The grid widgets it drives are reached through the
//! [`SortHeader`] and [`Paginator`] traits, layout changes arrive through a
//! [`Viewport`] subscription.

pub mod action;
pub mod adaptive;
pub mod column;
pub mod domain;
pub mod filter;
pub mod loader;
pub mod projection;
pub mod sort;
pub mod value;
pub mod viewport;
pub mod widgets;

pub use action::RowAction;
pub use adaptive::{AdaptiveTableController, TableSnapshot};
pub use column::{ColumnDefinition, ColumnKind, ColumnRegistry, ValueAccessor};
pub use domain::{AtvConfig, AtvError, ConfigError};
pub use filter::FilterEngine;
pub use projection::{ModeProjection, PageInfo, Projection};
pub use sort::{SortDirection, SortEngine, SortSpecification};
pub use value::{Record, Row, Value};
pub use viewport::{Viewport, ViewportSubscription};
pub use widgets::{PageState, Paginator, SortHeader, SortHeaderState};
