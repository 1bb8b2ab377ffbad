//! Reading and writing tables on disk.
//!
//! Loading is deliberately thin: files are parsed as delimited text with a
//! header row and handed to the trainer untouched. Cleaning and imputation are
//! the caller's business.

use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("No .csv files were found in '{}'.", .0.display())]
    NoTables(PathBuf),
}

/// Tab for `.tsv`/`.tab` files, comma for everything else.
fn separator_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => b'\t',
        _ => b',',
    }
}

/// Reads one delimited file with a header row.
pub fn load_table(path: impl AsRef<Path>) -> Result<DataFrame, DataError> {
    let path = path.as_ref();
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(
                    CsvParseOptions::default().with_separator(separator_for(path)),
                ),
        )
        .finish()?;
    log::info!(
        "Loaded {} rows and {} columns from '{}'.",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Loads every `.csv` file directly inside `dir`, keyed by file stem.
pub fn discover_tables(dir: impl AsRef<Path>) -> Result<BTreeMap<String, DataFrame>, DataError> {
    let dir = dir.as_ref();
    let mut tables = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !path.is_file() || !is_csv {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            log::warn!("Skipping '{}': file name is not valid UTF-8.", path.display());
            continue;
        };
        let stem = stem.to_string();
        tables.insert(stem, load_table(&path)?);
    }

    if tables.is_empty() {
        return Err(DataError::NoTables(dir.to_path_buf()));
    }
    Ok(tables)
}

/// Writes `df` as comma-separated text with a header row.
pub fn write_table(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<(), DataError> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(separator_for(path))
        .finish(df)?;
    log::info!("Wrote {} rows to '{}'.", df.height(), path.display());
    Ok(())
}
