pub const TABLES: &str = "
    CREATE TABLE IF NOT EXISTS Document (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        filename TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS Tag (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS association (
        document_id INTEGER,
        tag_id INTEGER,
        FOREIGN KEY(document_id) REFERENCES Document(id),
        FOREIGN KEY(tag_id) REFERENCES Tag(id)
    );
";

pub const INDEXES: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_document_filename ON Document(filename);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_tag_value ON Tag(value);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_association_pair ON association(document_id, tag_id);
";

/// First-generation stores have no `name` column.
pub const ADD_NAME_COLUMN: &str = "
    ALTER TABLE Document ADD COLUMN name TEXT NOT NULL DEFAULT '';
    UPDATE Document SET name = filename WHERE name = '';
";

/// Folds rows sharing a natural key into the lowest id so the unique
/// indexes can be built over a store that never enforced them.
pub const MERGE_DUPLICATES: &str = "
    UPDATE association SET document_id = (
        SELECT MIN(keep.id) FROM Document keep
        JOIN Document dup ON dup.filename = keep.filename
        WHERE dup.id = association.document_id
    ) WHERE document_id IN (SELECT id FROM Document);

    DELETE FROM Document WHERE id NOT IN (
        SELECT MIN(id) FROM Document GROUP BY filename
    );

    UPDATE association SET tag_id = (
        SELECT MIN(keep.id) FROM Tag keep
        JOIN Tag dup ON dup.value = keep.value
        WHERE dup.id = association.tag_id
    ) WHERE tag_id IN (SELECT id FROM Tag);

    DELETE FROM Tag WHERE id NOT IN (
        SELECT MIN(id) FROM Tag GROUP BY value
    );

    DELETE FROM association WHERE rowid NOT IN (
        SELECT MIN(rowid) FROM association GROUP BY document_id, tag_id
    );
";

/// Tables as the first generation of the tool created them.
#[cfg(test)]
pub const LEGACY_LAYOUT: &str = "
    CREATE TABLE \"Document\" (
        id INTEGER NOT NULL,
        filename VARCHAR(250) NOT NULL,
        PRIMARY KEY (id)
    );

    CREATE TABLE \"Tag\" (
        id INTEGER NOT NULL,
        value VARCHAR(50) NOT NULL,
        PRIMARY KEY (id)
    );

    CREATE TABLE association (
        document_id INTEGER,
        tag_id INTEGER,
        FOREIGN KEY(document_id) REFERENCES \"Document\" (id),
        FOREIGN KEY(tag_id) REFERENCES \"Tag\" (id)
    );
";
