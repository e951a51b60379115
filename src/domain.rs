use std::fmt;
use std::io::Error;

use clap::Parser;
use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use tracing_error::SpanTrace;

pub const HELP_TEXT: &str = "\
Navigation
  Up/Down       move the row cursor
  Left/Right    select the sort column
  PgUp/PgDn     previous/next page (grid)
  Home/End      first/last page (grid)

Sorting & filtering
  s             sort selected column ascending
  S             sort selected column descending
  t             toggle sort direction
  /             edit the filter query
  Esc           clear the filter / close popup

Row actions
  1-9           run the n-th action on the selected row

  ?             this help
  q             quit";

#[derive(Debug)]
pub enum AtvError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    Config(ConfigError, SpanTrace),
}

impl fmt::Display for AtvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtvError::IoError(e) => write!(f, "io error: {e}"),
            AtvError::PolarsError(e) => write!(f, "polars error: {e}"),
            AtvError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            AtvError::FileNotFound => f.write_str("file not found"),
            AtvError::PermissionDenied => f.write_str("permission denied"),
            AtvError::UnknownFileType => f.write_str("unknown file type"),
            AtvError::Config(e, trace) => write!(f, "{e}\n{trace}"),
        }
    }
}

impl std::error::Error for AtvError {}

impl From<Error> for AtvError {
    fn from(err: Error) -> Self {
        AtvError::IoError(err)
    }
}

impl From<PolarsError> for AtvError {
    fn from(err: PolarsError) -> Self {
        AtvError::PolarsError(err)
    }
}

impl From<ConfigError> for AtvError {
    fn from(err: ConfigError) -> Self {
        AtvError::Config(err, SpanTrace::capture())
    }
}

/// Faults in the column set up handed to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    DuplicateColumnKey(String),
    NoColumns,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateColumnKey(key) => {
                write!(f, "column key \"{key}\" is defined more than once")
            }
            ConfigError::NoColumns => f.write_str("a table needs at least one column"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Parser, Debug, Clone, Setters)]
#[command(version, about = "A tui based adaptive table viewer.")]
#[setters(prefix = "with_")]
pub struct AtvConfig {
    /// Data file to open (csv, parquet, arrow/ipc)
    pub path: String,

    /// Rows per grid page
    #[arg(long, default_value_t = 20)]
    pub page_size: usize,

    /// Terminal width (columns) below which the card list is shown
    #[arg(long, default_value_t = 100)]
    pub compact_breakpoint: u16,

    /// Number of leading columns shown on cards
    #[arg(long, default_value_t = 5)]
    pub compact_columns: usize,

    /// Columns rendered as colored tags, comma separated
    #[arg(long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Warn when the card list holds more rows than this
    #[arg(long, default_value_t = 1000)]
    pub card_warn_threshold: usize,

    /// Max width of a grid column
    #[arg(long, default_value_t = 40)]
    pub max_column_width: usize,

    /// Event poll time in ms
    #[arg(long, default_value_t = 100)]
    pub event_poll_time: u64,

    /// Log file, the terminal belongs to the ui
    #[arg(long, default_value = "atv.log")]
    pub log_file: String,
}

impl Default for AtvConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            page_size: 20,
            compact_breakpoint: 100,
            compact_columns: 5,
            tags: Vec::new(),
            card_warn_threshold: 1000,
            max_column_width: 40,
            event_poll_time: 100,
            log_file: "atv.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PreviousPage,
    NextPage,
    FirstPage,
    LastPage,
    SortAscending,
    SortDescending,
    ToggleSortDirection,
    Filter,
    Action(usize),
    Resize(u16, u16),
    Help,
    Exit,
    RawKey(KeyEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_default_config() {
        let parsed = AtvConfig::parse_from(["atv", "users.csv"]);
        let default = AtvConfig::default().with_path("users.csv".to_string());
        assert_eq!(parsed.page_size, default.page_size);
        assert_eq!(parsed.compact_breakpoint, default.compact_breakpoint);
        assert_eq!(parsed.compact_columns, default.compact_columns);
        assert_eq!(parsed.card_warn_threshold, default.card_warn_threshold);
        assert_eq!(parsed.log_file, default.log_file);
        assert_eq!(parsed.path, "users.csv");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn tag_columns_are_comma_separated() {
        let parsed = AtvConfig::parse_from(["atv", "--tag", "role,status", "users.csv"]);
        assert_eq!(parsed.tags, ["role", "status"]);
    }

    #[test]
    fn config_error_converts_with_span_trace() {
        let err: AtvError = ConfigError::DuplicateColumnKey("name".into()).into();
        assert!(matches!(
            err,
            AtvError::Config(ConfigError::DuplicateColumnKey(ref k), _) if k == "name"
        ));
    }
}
