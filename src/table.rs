// table.rs — CSV input/output for the embedding column.
//
// The whole table is read up front and the output is only renamed into place once
// every row has been written, so a failed run never leaves a partial file behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::config;
use crate::error::{EmbedError, Result};

/// An in-memory CSV table: header plus rows, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.headers.iter().map(str::to_string).collect()
    }

    /// Set column `name` to `values`: replaced in place if the header already has it,
    /// appended as the last column otherwise. `values` must have one entry per row.
    pub fn with_column(self, name: &str, values: Vec<String>) -> Self {
        debug_assert_eq!(values.len(), self.rows.len());

        match self.column_index(name) {
            Some(idx) => {
                let rows = self
                    .rows
                    .iter()
                    .zip(&values)
                    .map(|(row, value)| {
                        row.iter()
                            .enumerate()
                            .map(|(i, field)| if i == idx { value.as_str() } else { field })
                            .collect::<StringRecord>()
                    })
                    .collect();
                Self {
                    headers: self.headers,
                    rows,
                }
            }
            None => {
                let mut headers = self.headers;
                headers.push_field(name);
                let rows = self
                    .rows
                    .into_iter()
                    .zip(values)
                    .map(|(mut row, value)| {
                        row.push_field(&value);
                        row
                    })
                    .collect();
                Self { headers, rows }
            }
        }
    }
}

/// Read a comma-separated file with a header row.
pub fn read_table(path: &Path) -> Result<Table> {
    let table_err = |reason: String| EmbedError::TableRead {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| table_err(e.to_string()))?;

    let headers = reader.headers().map_err(|e| table_err(e.to_string()))?.clone();
    if headers.is_empty() {
        return Err(table_err("no header row".to_string()));
    }

    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| table_err(e.to_string()))?;

    log::debug!(
        "Read {} rows x {} columns from {}",
        rows.len(),
        headers.len(),
        path.display()
    );

    Ok(Table { headers, rows })
}

/// Write `table` to `dir/file`, creating `dir` if needed and replacing any existing file.
pub fn write_table(table: &Table, dir: &Path, file: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| EmbedError::io(dir, e))?;

    let dest = dir.join(file);
    let tmp_name = format!(
        ".{}.{}",
        dest.file_name().unwrap_or_default().to_string_lossy(),
        config::table::TMP_SUFFIX
    );
    let tmp_path = dest.with_file_name(tmp_name);

    if let Err(e) = write_records(table, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(EmbedError::io(&tmp_path, e));
    }

    fs::rename(&tmp_path, &dest).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        EmbedError::io(&dest, e)
    })?;

    Ok(dest)
}

fn write_records(table: &Table, path: &Path) -> io::Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()
}

/// Serialize a vector as a JSON list (`[0.1,-0.2]`) for a CSV cell.
pub fn format_vector(vector: &[f32]) -> serde_json::Result<String> {
    serde_json::to_string(vector)
}
