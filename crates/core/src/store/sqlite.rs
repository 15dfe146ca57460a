//! SQLite-backed workbook.
//!
//! Each sheet is a row in `sheets` plus a sparse set of `(row, col, value)`
//! rows in `cells`. Values are stored as JSON text. Writing
//! [`CellValue::Empty`] deletes the cell so that sheet extents track populated
//! cells only.

use std::path::Path;

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::Connection as RawConnection;
use tokio_rusqlite::Connection;

use super::{
    CellValue, MAX_CELLS, MAX_COLS, MAX_ROWS, RangeSpec, Table, TabularStore, check_cells, check_coords, check_range,
    check_span, migrations,
};
use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// SQLite-backed tabular store.
///
/// Wraps a tokio-rusqlite Connection that runs statements on a background
/// thread. Cloning shares the connection.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pub(crate) conn: Connection,
}

impl SqliteStore {
    /// Open a workbook at `path`, creating it if needed, and apply pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory workbook.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS))
            .await
            .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

/// Coordinate as bound into SQL. Callers check bounds first; this only guards the cast.
fn sql_index(n: usize) -> Result<i64, Error> {
    i64::try_from(n).map_err(|_| Error::InvalidInput(format!("coordinate {n} does not fit the store")))
}

/// Coordinate as read back from SQL.
fn stored_index(n: i64) -> Result<usize, Error> {
    usize::try_from(n).map_err(|_| Error::Codec(format!("stored coordinate {n} is not a sheet position")))
}

fn require_sheet(conn: &RawConnection, sheet: &str) -> Result<(), Error> {
    let exists: bool =
        conn.query_row("SELECT EXISTS(SELECT 1 FROM sheets WHERE name = ?1)", params![sheet], |row| row.get(0))?;
    if exists { Ok(()) } else { Err(Error::SheetNotFound(sheet.to_string())) }
}

fn put_cell(conn: &RawConnection, sheet: &str, row: usize, col: usize, value: &CellValue) -> Result<(), Error> {
    let (row, col) = (sql_index(row)?, sql_index(col)?);
    if *value == CellValue::Empty {
        conn.execute("DELETE FROM cells WHERE sheet = ?1 AND row = ?2 AND col = ?3", params![sheet, row, col])?;
        return Ok(());
    }

    let json = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO cells (sheet, row, col, value_json, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(sheet, row, col) DO UPDATE SET
            value_json = excluded.value_json,
            updated_at = excluded.updated_at",
        params![sheet, row, col, json, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Writes `values` left to right from `(row, col)` inside one transaction.
fn put_run(conn: &mut RawConnection, sheet: &str, row: usize, col: usize, values: &[CellValue]) -> Result<(), Error> {
    let tx = conn.transaction()?;
    for (i, value) in values.iter().enumerate() {
        put_cell(&tx, sheet, row, col + i, value)?;
    }
    tx.commit()?;
    Ok(())
}

/// Loads the `rows` x `cols` block anchored at `(first_row, first_col)` into a grid.
fn load_block(
    conn: &RawConnection, sheet: &str, first_row: usize, first_col: usize, rows: usize, cols: usize,
) -> Result<Table, Error> {
    check_cells(rows, cols)?;
    let last_row = first_row + rows - 1;
    let last_col = first_col + cols - 1;

    let mut grid = vec![vec![CellValue::Empty; cols]; rows];
    let mut stmt = conn.prepare(
        "SELECT row, col, value_json FROM cells
         WHERE sheet = ?1 AND row BETWEEN ?2 AND ?3 AND col BETWEEN ?4 AND ?5",
    )?;
    let cells = stmt.query_map(
        params![sheet, sql_index(first_row)?, sql_index(last_row)?, sql_index(first_col)?, sql_index(last_col)?],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?)),
    )?;

    for cell in cells {
        let (r, c, json) = cell?;
        let (r, c) = (stored_index(r)?, stored_index(c)?);
        let slot = r
            .checked_sub(first_row)
            .zip(c.checked_sub(first_col))
            .and_then(|(r, c)| grid.get_mut(r).and_then(|cells| cells.get_mut(c)));
        match slot {
            Some(slot) => *slot = serde_json::from_str(&json)?,
            None => return Err(Error::Codec(format!("cell {r},{c} returned outside the requested block"))),
        }
    }
    Ok(grid)
}

/// Populated extent of a sheet as `(rows, cols)`, or `None` when it has no cells.
fn extent(conn: &RawConnection, sheet: &str) -> Result<Option<(usize, usize)>, Error> {
    let (rows, cols): (Option<i64>, Option<i64>) =
        conn.query_row("SELECT MAX(row), MAX(col) FROM cells WHERE sheet = ?1", params![sheet], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
    let (Some(rows), Some(cols)) = (rows, cols) else {
        return Ok(None);
    };
    let (rows, cols) = (stored_index(rows)?, stored_index(cols)?);
    let oversized = rows.checked_mul(cols).is_none_or(|cells| cells > MAX_CELLS);
    if rows > MAX_ROWS || cols > MAX_COLS || oversized {
        return Err(Error::Codec(format!("sheet {sheet} spans {rows}x{cols}, more than a table read allows")));
    }
    Ok(Some((rows, cols)))
}

#[async_trait]
impl TabularStore for SqliteStore {
    async fn read_all(&self, sheet: &str) -> Result<Table, Error> {
        let sheet = sheet.to_string();
        self.conn
            .call(move |conn| -> Result<Table, Error> {
                require_sheet(conn, &sheet)?;
                match extent(conn, &sheet)? {
                    Some((rows, cols)) => load_block(conn, &sheet, 1, 1, rows, cols),
                    None => Ok(Vec::new()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn read_range(&self, sheet: &str, range: RangeSpec) -> Result<Table, Error> {
        check_range(&range)?;
        let sheet = sheet.to_string();
        self.conn
            .call(move |conn| -> Result<Table, Error> {
                require_sheet(conn, &sheet)?;
                load_block(conn, &sheet, range.row, range.col, range.rows, range.cols)
            })
            .await
            .map_err(Error::from)
    }

    async fn write_cell(&self, sheet: &str, row: usize, col: usize, value: CellValue) -> Result<(), Error> {
        check_coords(row, col)?;
        let sheet = sheet.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                require_sheet(conn, &sheet)?;
                put_cell(conn, &sheet, row, col, &value)
            })
            .await
            .map_err(Error::from)
    }

    async fn write_range(&self, sheet: &str, row: usize, col: usize, values: Vec<CellValue>) -> Result<(), Error> {
        check_span(row, col, values.len())?;
        let sheet = sheet.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                require_sheet(conn, &sheet)?;
                put_run(conn, &sheet, row, col, &values)
            })
            .await
            .map_err(Error::from)
    }

    async fn append_row(&self, sheet: &str, values: Vec<CellValue>) -> Result<usize, Error> {
        let sheet = sheet.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                require_sheet(conn, &sheet)?;
                let last: i64 = conn.query_row(
                    "SELECT COALESCE(MAX(row), 0) FROM cells WHERE sheet = ?1",
                    params![sheet],
                    |row| row.get(0),
                )?;
                let row = stored_index(last)?.saturating_add(1);
                check_span(row, 1, values.len())?;
                put_run(conn, &sheet, row, 1, &values)?;
                Ok(row)
            })
            .await
            .map_err(Error::from)
    }

    async fn flush(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);"))
            .await
            .map_err(Error::Database)
    }

    async fn get_or_create_sheet(&self, sheet: &str, header: &[String]) -> Result<bool, Error> {
        check_span(1, 1, header.len())?;
        let sheet = sheet.to_string();
        let header: Vec<CellValue> = header.iter().map(|h| CellValue::from(h.as_str())).collect();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO sheets (name, created_at) VALUES (?1, ?2)",
                    params![sheet, chrono::Utc::now().to_rfc3339()],
                )?;
                if inserted == 1 {
                    for (i, value) in header.iter().enumerate() {
                        put_cell(&tx, &sheet, 1, i + 1, value)?;
                    }
                }
                tx.commit()?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }
}
