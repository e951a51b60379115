use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::column::{ColumnDefinition, ColumnRegistry};
use crate::domain::{AtvError, ConfigError};
use crate::value::{Record, Value};

pub const ACTIONS_COLUMN: &str = "actions";

#[derive(Debug, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A file loaded into rows, with its column names in file order.
#[derive(Debug)]
pub struct LoadedTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

/// Loads a csv, parquet or arrow file. Columns are converted in parallel,
/// numeric columns keep numeric values so they sort as numbers.
pub fn load_data_file(path: &Path) -> Result<LoadedTable, AtvError> {
    let file_info = get_file_info(path.to_path_buf())?;
    debug!("Loading {:?}", file_info);
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    let start_time = Instant::now();
    let df = frame.collect()?;
    let columns: Vec<(String, Vec<Value>)> = df
        .get_column_names()
        .par_iter()
        .map(|name| Ok((name.to_string(), load_column(&df, name)?)))
        .collect::<Result<_, PolarsError>>()?;

    if columns.is_empty() {
        return Err(AtvError::LoadingFailed("File has no columns!".into()));
    }

    let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
    let rows = into_records(columns, df.height());

    info!(
        "Loading {} rows x {} columns ({} bytes) took {}ms ...",
        rows.len(),
        names.len(),
        file_info.file_size,
        start_time.elapsed().as_millis()
    );

    Ok(LoadedTable {
        name: file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string(),
        columns: names,
        rows,
    })
}

/// Key of the trailing actions column. Underscores are prepended until it
/// no longer clashes with a loaded header.
pub fn actions_key(columns: &[String]) -> String {
    let mut key = ACTIONS_COLUMN.to_string();
    while columns.contains(&key) {
        key.insert(0, '_');
    }
    key
}

/// Registry for a loaded file: every column plain and sortable, the first
/// `compact_columns` shown on cards, `tags` rendered as tags, plus a
/// trailing actions column under [`actions_key`].
///
/// Headers are looked up verbatim, a header like `user.name` is one field
/// and not a path.
pub fn default_registry(
    columns: &[String],
    compact_columns: usize,
    tags: &[String],
) -> Result<ColumnRegistry<Record>, ConfigError> {
    let mut definitions: Vec<ColumnDefinition<Record>> = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let field = name.clone();
            let column = ColumnDefinition::new(name.as_str(), name.as_str())
                .with_accessor(move |row: &Record| row.get(&field).cloned().unwrap_or_default())
                .with_visible_in_compact_mode(idx < compact_columns);
            if tags.contains(name) {
                column.with_tag_color(|value, _| Some(tag_color(value)))
            } else {
                column
            }
        })
        .collect();
    definitions.push(ColumnDefinition::actions(actions_key(columns), "Actions"));
    ColumnRegistry::new(definitions)
}

const TAG_PALETTE: [&str; 6] = ["primary", "accent", "warn", "green", "yellow", "cyan"];

// Same value, same color, across runs.
fn tag_color(value: &Value) -> String {
    let hash = value
        .to_string()
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    TAG_PALETTE[hash % TAG_PALETTE.len()].to_string()
}

fn into_records(columns: Vec<(String, Vec<Value>)>, nrows: usize) -> Vec<Record> {
    let mut cells: Vec<(String, std::vec::IntoIter<Value>)> = columns
        .into_iter()
        .map(|(name, values)| (name, values.into_iter()))
        .collect();
    (0..nrows)
        .map(|_| {
            cells
                .iter_mut()
                .map(|(name, values)| (name.clone(), values.next().unwrap_or_default()))
                .collect::<Record>()
        })
        .collect()
}

fn detect_file_type(path: &Path) -> Result<FileType, AtvError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(AtvError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, AtvError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AtvError::FileNotFound,
        ErrorKind::PermissionDenied => AtvError::PermissionDenied,
        _ => AtvError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(AtvError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

fn is_integer_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn is_float_type(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<Value>, PolarsError> {
    let original_dtype = df.column(col_name)?.dtype().clone();

    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| match value {
            Some(s) => parse_cell(s, &original_dtype),
            None => Value::Null,
        })
        .collect();
    Ok(data)
}

fn parse_cell(s: &str, dtype: &DataType) -> Value {
    if is_integer_type(dtype) {
        // UInt64 may not fit, fall back to a float
        s.parse::<i64>()
            .map(Value::Int)
            .or_else(|_| s.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::from(s))
    } else if is_float_type(dtype) {
        s.parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::from(s))
    } else if matches!(dtype, DataType::Boolean) {
        s.parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::from(s))
    } else {
        Value::from(s)
    }
}

fn load_csv(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.as_path().into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(
        PlPath::Local(path.as_path().into()),
        ScanArgsParquet::default(),
    )
}

fn load_arrow(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.as_path().into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
