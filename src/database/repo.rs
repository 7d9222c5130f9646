use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Params};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::schema::{ADD_NAME_COLUMN, INDEXES, MERGE_DUPLICATES, TABLES};
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: i64,
    pub name: String,
    pub filename: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachStatus {
    Attached,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub inserted: usize,
    pub failed: usize,
}

/// Handle on the SQLite catalog. One per invocation; every mutating call
/// runs in its own transaction and is committed before returning.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CatalogError::Configuration(format!(
                        "cannot create storage directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            CatalogError::Configuration(format!(
                "cannot open storage at {}: {e}",
                path.display()
            ))
        })?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('Document', 'Tag', 'association')",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 3)
    }

    /// True for a store whose tables exist but predate the `name` column or
    /// the unique indexes.
    pub fn is_outdated(&self) -> Result<bool> {
        if !self.exists()? {
            return Ok(false);
        }
        Ok(!has_column(&self.conn, "Document", "name")?
            || !has_index(&self.conn, "idx_document_filename")?)
    }

    pub fn ensure_schema(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(TABLES)?;

        if !has_column(&tx, "Document", "name")? {
            info!("Upgrading legacy Document table with a name column");
            tx.execute_batch(ADD_NAME_COLUMN)?;
        }

        // Unique indexes are missing on fresh and on legacy stores alike.
        if !has_index(&tx, "idx_document_filename")? {
            debug!("Merging duplicate natural keys before building unique indexes");
            tx.execute_batch(MERGE_DUPLICATES)?;
        }
        tx.execute_batch(INDEXES)?;

        tx.commit()?;
        Ok(())
    }

    pub fn contains_filename(&self, filename: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM Document WHERE filename = ?1")?;
        Ok(stmt.exists(params![filename])?)
    }

    /// Inserts `filenames` as new documents in one transaction. A row that
    /// fails on its own is logged and counted, the rest still commit.
    pub fn insert_documents(&mut self, filenames: &[String]) -> Result<InsertSummary> {
        let mut summary = InsertSummary::default();
        if filenames.is_empty() {
            return Ok(summary);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO Document (name, filename) VALUES (?1, ?1)")?;
            for filename in filenames {
                match stmt.execute(params![filename]) {
                    Ok(_) => summary.inserted += 1,
                    Err(e) => {
                        warn!("Failed to insert document {}: {}", filename, e);
                        summary.failed += 1;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    pub fn document(&self, id: i64) -> Result<Option<Document>> {
        let row: Option<(i64, String, String)> = self
            .conn
            .query_row(
                "SELECT id, name, filename FROM Document WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((id, name, filename)) => Ok(Some(Document {
                id,
                name,
                filename,
                tags: self.tags_of(id)?,
            })),
            None => Ok(None),
        }
    }

    /// Attaches each value to the document, creating missing tags. A pair
    /// that already exists is left alone and reported as such.
    pub fn attach_tags(
        &mut self,
        document_id: i64,
        values: &[String],
    ) -> Result<Vec<(String, AttachStatus)>> {
        let tx = self.conn.transaction()?;
        let mut attached = Vec::with_capacity(values.len());
        {
            let mut stmt_tag = tx.prepare("INSERT OR IGNORE INTO Tag (value) VALUES (?1)")?;
            let mut stmt_get_tag_id = tx.prepare("SELECT id FROM Tag WHERE value = ?1")?;
            let mut stmt_link = tx.prepare(
                "INSERT OR IGNORE INTO association (document_id, tag_id) VALUES (?1, ?2)",
            )?;

            for value in values {
                if stmt_tag.execute(params![value])? > 0 {
                    debug!("Created tag '{}'", value);
                }

                let tag_id: i64 = stmt_get_tag_id.query_row(params![value], |row| row.get(0))?;

                let status = if stmt_link.execute(params![document_id, tag_id])? > 0 {
                    AttachStatus::Attached
                } else {
                    AttachStatus::AlreadyPresent
                };
                attached.push((value.clone(), status));
            }
        }
        tx.commit()?;
        Ok(attached)
    }

    /// Both filters are optional and combine with AND. The name filter is a
    /// plain case-sensitive substring test, `%` and `_` match themselves.
    pub fn find(&self, name: Option<&str>, tag: Option<&str>) -> Result<Vec<Document>> {
        self.query_documents(
            "SELECT d.id, d.name, d.filename FROM Document d
             WHERE (?1 IS NULL OR instr(d.filename, ?1) > 0)
               AND (?2 IS NULL OR EXISTS (
                   SELECT 1 FROM association a
                   JOIN Tag t ON t.id = a.tag_id
                   WHERE a.document_id = d.id AND t.value = ?2
               ))
             ORDER BY d.id",
            params![name, tag],
        )
    }

    /// `None` lists every document.
    pub fn list(&self, limit: Option<u32>) -> Result<Vec<Document>> {
        let limit = limit.map_or(-1, i64::from);
        self.query_documents(
            "SELECT id, name, filename FROM Document ORDER BY id LIMIT ?1",
            params![limit],
        )
    }

    fn query_documents<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut documents = stmt
            .query_map(params, |row| {
                Ok(Document {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    filename: row.get(2)?,
                    tags: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for document in &mut documents {
            document.tags = self.tags_of(document.id)?;
        }
        Ok(documents)
    }

    fn tags_of(&self, document_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT t.value FROM association a
             JOIN Tag t ON t.id = a.tag_id
             WHERE a.document_id = ?1
             ORDER BY t.value",
        )?;
        let tags = stmt
            .query_map(params![document_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == column))
}

fn has_index(conn: &Connection, index: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1")?;
    Ok(stmt.exists(params![index])?)
}
