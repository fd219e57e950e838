use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed row {row}: {source}")]
    Json {
        row: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("cell ({row}, {col}) is outside the sheet")]
    OutOfRange { row: usize, col: usize },
    #[error("failed to create store directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One data row keyed by header name. `row` is the 1-based sheet row, so the
/// first data row is 2.
#[derive(Debug, Clone)]
pub struct SheetRecord {
    pub row: usize,
    pub fields: HashMap<String, String>,
}

impl SheetRecord {
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A spreadsheet-like table: row 1 is the header, rows and columns are
/// 1-based. Rows may be ragged; missing cells read as empty.
pub trait TableStore {
    fn get_all_values(&self) -> Result<Vec<Vec<String>>>;

    /// Appends after the last row; existing rows are never touched.
    fn append_rows(&mut self, rows: &[Vec<String>]) -> Result<()>;

    fn update_cell(&mut self, row: usize, col: usize, value: &str) -> Result<()>;

    fn get_all_records(&self) -> Result<Vec<SheetRecord>> {
        let values = self.get_all_values()?;
        let Some((header, rows)) = values.split_first() else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, row)| SheetRecord {
                row: i + 2,
                fields: header
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| !name.is_empty())
                    .map(|(c, name)| (name.clone(), row.get(c).cloned().unwrap_or_default()))
                    .collect(),
            })
            .collect())
    }
}

// --- In-memory sheet ---

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemorySheet {
    rows: Vec<Vec<String>>,
}

#[cfg(test)]
impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }
}

#[cfg(test)]
impl TableStore for MemorySheet {
    fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.rows.clone())
    }

    fn append_rows(&mut self, rows: &[Vec<String>]) -> Result<()> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn update_cell(&mut self, row: usize, col: usize, value: &str) -> Result<()> {
        if row == 0 || col == 0 || row > self.rows.len() {
            return Err(StoreError::OutOfRange { row, col });
        }
        set_cell(&mut self.rows[row - 1], col, value);
        Ok(())
    }
}

fn set_cell(cells: &mut Vec<String>, col: usize, value: &str) {
    if cells.len() < col {
        cells.resize(col, String::new());
    }
    cells[col - 1] = value.to_string();
}

// --- SQLite-backed sheet ---

/// A named worksheet persisted in SQLite, one table row per sheet row with
/// the cells stored as a JSON array.
pub struct SqliteSheet {
    conn: Connection,
    path: Option<PathBuf>,
    name: String,
}

impl SqliteSheet {
    pub fn open(path: &Path, name: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let sheet = Self {
            conn,
            path: Some(path.to_path_buf()),
            name: name.to_string(),
        };
        sheet.init()?;
        Ok(sheet)
    }

    #[cfg(test)]
    pub fn open_in_memory(name: &str) -> Result<Self> {
        let sheet = Self {
            conn: Connection::open_in_memory()?,
            path: None,
            name: name.to_string(),
        };
        sheet.init()?;
        Ok(sheet)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sheet_rows (
                sheet TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                cells TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (sheet, row_index)
            );
            "#,
        )?;
        Ok(())
    }

    fn row_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(row_index), 0) FROM sheet_rows WHERE sheet = ?1",
            [&self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn decode(row: usize, cells: &str) -> Result<Vec<String>> {
        serde_json::from_str(cells).map_err(|source| StoreError::Json { row, source })
    }

    fn encode(row: usize, cells: &[String]) -> Result<String> {
        serde_json::to_string(cells).map_err(|source| StoreError::Json { row, source })
    }
}

impl TableStore for SqliteSheet {
    fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT row_index, cells FROM sheet_rows WHERE sheet = ?1 ORDER BY row_index",
        )?;
        let rows = stmt
            .query_map([&self.name], |row| {
                Ok((row.get::<_, i64>(0)? as usize, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|(index, cells)| Self::decode(*index, cells))
            .collect()
    }

    fn append_rows(&mut self, rows: &[Vec<String>]) -> Result<()> {
        let next = self.row_count()? + 1;
        let tx = self.conn.transaction()?;
        for (offset, cells) in rows.iter().enumerate() {
            let index = next + offset;
            tx.execute(
                "INSERT INTO sheet_rows (sheet, row_index, cells) VALUES (?1, ?2, ?3)",
                params![self.name, index as i64, Self::encode(index, cells)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update_cell(&mut self, row: usize, col: usize, value: &str) -> Result<()> {
        if row == 0 || col == 0 {
            return Err(StoreError::OutOfRange { row, col });
        }
        let cells: Option<String> = self
            .conn
            .query_row(
                "SELECT cells FROM sheet_rows WHERE sheet = ?1 AND row_index = ?2",
                params![self.name, row as i64],
                |r| r.get(0),
            )
            .optional()?;
        let Some(cells) = cells else {
            return Err(StoreError::OutOfRange { row, col });
        };
        let mut cells = Self::decode(row, &cells)?;
        set_cell(&mut cells, col, value);
        self.conn.execute(
            "UPDATE sheet_rows SET cells = ?1, updated_at = datetime('now')
             WHERE sheet = ?2 AND row_index = ?3",
            params![Self::encode(row, &cells)?, self.name, row as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn exercise(store: &mut dyn TableStore) {
        assert!(store.get_all_values().unwrap().is_empty());
        assert!(store.get_all_records().unwrap().is_empty());

        store
            .append_rows(&[strings(&["Job ID", "Title"]), strings(&["1", "PM"])])
            .unwrap();
        store.append_rows(&[strings(&["2"])]).unwrap();

        let values = store.get_all_values().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], strings(&["2"]));

        store.update_cell(3, 2, "Product Owner").unwrap();
        store.update_cell(1, 4, "Status").unwrap();

        let values = store.get_all_values().unwrap();
        assert_eq!(values[0], strings(&["Job ID", "Title", "", "Status"]));
        assert_eq!(values[2], strings(&["2", "Product Owner"]));

        let records = store.get_all_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 2);
        assert_eq!(records[1].get("Title"), "Product Owner");
        assert_eq!(records[1].get("Status"), "");
        assert_eq!(records[1].get("Missing"), "");

        assert!(matches!(
            store.update_cell(9, 1, "x"),
            Err(StoreError::OutOfRange { row: 9, col: 1 })
        ));
        assert!(store.update_cell(1, 0, "x").is_err());
    }

    #[test]
    fn test_memory_sheet() {
        exercise(&mut MemorySheet::new());
    }

    #[test]
    fn test_sqlite_sheet() {
        exercise(&mut SqliteSheet::open_in_memory("jobs").unwrap());
    }

    #[test]
    fn test_sqlite_sheets_are_isolated_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sheets.db");
        {
            let mut a = SqliteSheet::open(&path, "A").unwrap();
            a.append_rows(&[strings(&["header"]), strings(&["a"])]).unwrap();
        }
        let mut b = SqliteSheet::open(&path, "B").unwrap();
        assert!(b.get_all_values().unwrap().is_empty());
        b.append_rows(&[strings(&["header"])]).unwrap();

        let a = SqliteSheet::open(&path, "A").unwrap();
        assert_eq!(a.get_all_values().unwrap().len(), 2);
        assert_eq!(a.path(), Some(path.as_path()));
        assert_eq!(a.name(), "A");
    }
}
